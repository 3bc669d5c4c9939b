//! Run a simulated census mesh and print the size estimates it produces.
//!
//! ```text
//! census-sim [NODES] [STEADY_EPOCHS] [--json]
//! ```

use census_node::NodeEvent;
use census_sim::{SimConfig, SimNetwork, SimReport};
use census_sync::Ticks;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&String> = args[1..].iter().filter(|a| !a.starts_with("--")).collect();

    let nodes: usize = positional
        .first()
        .map(|a| a.parse().expect("NODES must be a number"))
        .unwrap_or(5);
    let steady_epochs: Ticks = positional
        .get(1)
        .map(|a| a.parse().expect("STEADY_EPOCHS must be a number"))
        .unwrap_or(10);

    let config = SimConfig {
        nodes,
        // Stagger the start of every node by a quarter second to make the
        // synchronizer work for its keep.
        start_offsets: (0..nodes as Ticks).map(|i| i * 32).collect(),
        ..Default::default()
    };
    let node_config = config.node_config;
    let rows = node_config.estimator.rows;

    let mut sim = SimNetwork::new(config);
    let warmup =
        node_config.sync.warmup.interval * Ticks::from(node_config.sync.epochs_until_synced);
    let horizon = warmup + steady_epochs * node_config.sync.steady.interval;

    let events = sim.run(horizon);

    if json {
        let report = SimReport::from_events(&events, rows);
        println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
        return;
    }

    println!("simulated {nodes} nodes for {steady_epochs} steady epochs");
    for event in &events {
        match &event.event {
            NodeEvent::Synced => {
                println!("t={:>6} node {:>2} synced", event.at, event.node);
            }
            NodeEvent::Stats(stats) => {
                println!(
                    "t={:>6} node {:>2} epoch {:>3} estimate {:>6.2}",
                    event.at,
                    event.node,
                    stats.epoch,
                    stats.estimate_size(rows)
                );
            }
            NodeEvent::EpochEnded => {}
        }
    }

    let report = SimReport::from_events(&events, rows);
    if let Some(last) = report.records.last() {
        let settled: Vec<f64> = report
            .records
            .iter()
            .filter(|r| r.epoch >= last.epoch - 2)
            .map(|r| r.estimate)
            .collect();
        let mean = settled.iter().sum::<f64>() / settled.len() as f64;
        println!("final estimate: {mean:.2} (true size {nodes})");
    }
}
