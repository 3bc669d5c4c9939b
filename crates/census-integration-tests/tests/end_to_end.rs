//! Whole-stack scenarios: synchronization, consensus and estimation
//! running together over the simulated broadcast medium.

use census_node::{NodeConfig, NodeEvent};
use census_sim::{SimConfig, SimNetwork, SimReport};
use census_sync::{Ticks, TICKS_PER_SECOND};

fn warmup_ticks(config: &NodeConfig) -> Ticks {
    config.sync.warmup.interval * Ticks::from(config.sync.epochs_until_synced)
}

/// Four nodes starting up to two seconds apart converge to aligned epoch
/// boundaries by the end of the warm-up period.
#[test]
fn staggered_mesh_synchronizes() {
    let config = SimConfig {
        nodes: 4,
        start_offsets: vec![
            0,
            TICKS_PER_SECOND / 2,
            TICKS_PER_SECOND,
            2 * TICKS_PER_SECOND,
        ],
        ..Default::default()
    };
    let node_config = config.node_config;
    let mut sim = SimNetwork::new(config);

    let mut synced = [false; 4];
    let deadline = warmup_ticks(&node_config) + 8 * node_config.sync.steady.interval;
    while synced.iter().any(|s| !s) {
        assert!(sim.now() < deadline, "mesh failed to sync before {deadline}");
        for event in sim.step() {
            if matches!(event.event, NodeEvent::Synced) {
                synced[event.node] = true;
            }
        }
    }

    for a in 0..4 {
        for b in (a + 1)..4 {
            let offset = sim.mutual_offset(a, b);
            assert!(offset <= 2, "nodes {a} and {b} still {offset} ticks apart");
        }
    }
}

/// A single isolated node, one epoch boundary, zero received frames:
/// exactly D statistics per epoch, deterministically reproducible.
#[test]
fn isolated_node_statistics_are_deterministic() {
    let run = || {
        let config = SimConfig {
            nodes: 1,
            ..Default::default()
        };
        let node_config = config.node_config;
        let mut sim = SimNetwork::new(config);
        let horizon =
            warmup_ticks(&node_config) + 2 * node_config.sync.steady.interval;
        let events = sim.run(horizon);
        SimReport::from_events(&events, node_config.estimator.rows)
    };

    let first = run();
    let second = run();

    assert!(!first.records.is_empty());
    for record in &first.records {
        assert_eq!(record.columns.len(), 7, "one statistic per column");
        assert!(record.columns.iter().all(|c| !c.is_zero()));
    }
    // Epochs count up from the warm-up boundary without gaps.
    for pair in first.records.windows(2) {
        assert_eq!(pair[1].epoch, pair[0].epoch + 1);
    }

    assert_eq!(first.records.len(), second.records.len());
    for (a, b) in first.records.iter().zip(&second.records) {
        assert_eq!(a.columns, b.columns, "simulation must replay exactly");
    }
}

/// With packet loss the estimate still lands near the true mesh size:
/// redundant gossip is the retry mechanism.
#[test]
fn lossy_mesh_estimates_its_size() {
    let config = SimConfig {
        nodes: 4,
        loss_permille: 100,
        ..Default::default()
    };
    let node_config = config.node_config;
    let mut sim = SimNetwork::new(config);

    let horizon = warmup_ticks(&node_config) + 8 * node_config.sync.steady.interval;
    let events = sim.run(horizon);
    let report = SimReport::from_events(&events, node_config.estimator.rows);

    let first_epoch = report.records.iter().map(|r| r.epoch).min().unwrap();
    let settled: Vec<f64> = report
        .records
        .iter()
        .filter(|r| r.epoch >= first_epoch + 2)
        .map(|r| r.estimate)
        .collect();
    assert!(!settled.is_empty());

    let mean = settled.iter().sum::<f64>() / settled.len() as f64;
    assert!(
        (1.5..12.0).contains(&mean),
        "estimate {mean} too far from a 4-node mesh"
    );
}

/// Disabling a node removes its statistics stream; re-enabling restores
/// it with a freshly sampled window.
#[test]
fn estimator_can_be_suspended_and_resumed() {
    let config = SimConfig {
        nodes: 2,
        ..Default::default()
    };
    let node_config = config.node_config;
    let mut sim = SimNetwork::new(config);
    let steady = node_config.sync.steady.interval;

    // Run through warm-up plus one active epoch.
    let events = sim.run(warmup_ticks(&node_config) + steady + steady / 2);
    assert!(events
        .iter()
        .any(|e| e.node == 1 && matches!(e.event, NodeEvent::Stats(_))));

    sim.node_mut(1).estimator_mut().estimator_mut().disable();
    let events = sim.run(2 * steady);
    assert!(!events
        .iter()
        .any(|e| e.node == 1 && matches!(e.event, NodeEvent::Stats(_))));
    assert!(events
        .iter()
        .any(|e| e.node == 0 && matches!(e.event, NodeEvent::Stats(_))));

    sim.node_mut(1).estimator_mut().estimator_mut().enable();
    let events = sim.run(2 * steady);
    assert!(events
        .iter()
        .any(|e| e.node == 1 && matches!(e.event, NodeEvent::Stats(_))));
}
