//! Deterministic multi-node simulation of the census protocol.
//!
//! Runs any number of [`Node`]s in one process on a shared virtual tick
//! clock, with a configurable broadcast medium: per-frame delivery delay,
//! Bernoulli loss, and per-node start offsets that model initially
//! unsynchronized clocks. Everything is seeded, so a simulation run is
//! reproducible bit for bit — the property the whole numeric substrate
//! exists for.
//!
//! The simulation doubles as the off-node aggregation side: it collects
//! every node's sufficient statistics and turns them into network-size
//! estimates.

use census_node::{BroadcastLink, ChannelId, LinkEvent, Node, NodeConfig, NodeEvent, NodeIdentity};
use census_rng::UniformRng;
use census_sync::Ticks;
use serde::Serialize;
use tracing::{debug, info};

/// Base hardware id for simulated nodes; node `i` gets `BASE + i`.
const BASE_NODE_ID: u64 = 0xC0FF_EE00;

/// Configuration for one simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of nodes in the mesh.
    pub nodes: usize,
    /// Broadcast flight time in ticks.
    pub delay_ticks: Ticks,
    /// Per-frame loss probability, in permille.
    pub loss_permille: u16,
    /// Per-node start offsets; nodes beyond the list start at tick 0.
    pub start_offsets: Vec<Ticks>,
    /// Seed for the loss process.
    pub seed: u64,
    /// Configuration shared by every node.
    pub node_config: NodeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 5,
            delay_ticks: 1,
            loss_permille: 0,
            start_offsets: Vec::new(),
            seed: 0x5EED_CAFE,
            node_config: NodeConfig::default(),
        }
    }
}

/// Something a node reported, with simulation context attached.
#[derive(Debug, Clone)]
pub struct SimEvent {
    /// Index of the reporting node.
    pub node: usize,
    /// Virtual time of the report.
    pub at: Ticks,
    /// The node's event.
    pub event: NodeEvent,
}

/// A frame on the wire, waiting for its delivery tick.
#[derive(Debug)]
struct Delivery {
    due: Ticks,
    target: usize,
    event: LinkEvent,
}

/// Collects one node's outgoing frames during its tick.
#[derive(Default)]
struct Outbox {
    sends: Vec<(ChannelId, Vec<u8>)>,
}

impl BroadcastLink for Outbox {
    fn send(&mut self, channel: ChannelId, frame: &[u8]) {
        self.sends.push((channel, frame.to_vec()));
    }
}

struct SimNode {
    node: Node,
    start_at: Ticks,
    pending: Vec<LinkEvent>,
}

/// The simulated mesh.
pub struct SimNetwork {
    config: SimConfig,
    nodes: Vec<SimNode>,
    in_flight: Vec<Delivery>,
    now: Ticks,
    loss_rng: UniformRng,
}

impl SimNetwork {
    /// Build the mesh; nodes start their epoch clocks at their configured
    /// offsets as the simulation advances.
    pub fn new(config: SimConfig) -> Self {
        assert!(config.nodes > 0, "simulation needs at least one node");

        let nodes = (0..config.nodes)
            .map(|i| {
                let identity = NodeIdentity::new(BASE_NODE_ID + i as u64);
                let start_at = config.start_offsets.get(i).copied().unwrap_or(0);
                SimNode {
                    node: Node::new(identity, config.node_config),
                    start_at,
                    pending: Vec::new(),
                }
            })
            .collect();

        info!(
            nodes = config.nodes,
            delay = config.delay_ticks,
            loss_permille = config.loss_permille,
            "simulation built"
        );

        Self {
            loss_rng: UniformRng::from_seed(config.seed | 1),
            config,
            nodes,
            in_flight: Vec::new(),
            now: 0,
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// A node, by index.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index].node
    }

    /// Mutable access to a node, for scenario control (enable/disable).
    pub fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index].node
    }

    /// Phase distance between two nodes' epoch boundaries, in ticks,
    /// folded into half an epoch interval.
    pub fn mutual_offset(&self, a: usize, b: usize) -> Ticks {
        let interval = self.config.node_config.sync.steady.interval;
        let d = self.nodes[a].node.syncer().sync().epoch_end_time()
            - self.nodes[b].node.syncer().sync().epoch_end_time();
        let m = d.rem_euclid(interval);
        m.min(interval - m)
    }

    /// Advance one tick, returning whatever the nodes reported.
    pub fn step(&mut self) -> Vec<SimEvent> {
        let now = self.now;

        for sim_node in &mut self.nodes {
            if !sim_node.node.is_started() && now >= sim_node.start_at {
                sim_node.node.start(now);
            }
        }

        // Deliver frames whose flight time has elapsed.
        let mut still_flying = Vec::new();
        for delivery in self.in_flight.drain(..) {
            if delivery.due <= now {
                self.nodes[delivery.target].pending.push(delivery.event);
            } else {
                still_flying.push(delivery);
            }
        }
        self.in_flight = still_flying;

        let mut reports = Vec::new();
        for i in 0..self.nodes.len() {
            let incoming = std::mem::take(&mut self.nodes[i].pending);
            let mut outbox = Outbox::default();
            let events = self.nodes[i].node.tick(now, &mut outbox, incoming);

            reports.extend(events.into_iter().map(|event| SimEvent {
                node: i,
                at: now,
                event,
            }));

            for (channel, frame) in outbox.sends {
                self.broadcast(i, channel, frame);
            }
        }

        self.now += 1;
        reports
    }

    /// Run for a duration, collecting all reports.
    pub fn run(&mut self, ticks: Ticks) -> Vec<SimEvent> {
        let mut reports = Vec::new();
        for _ in 0..ticks {
            reports.extend(self.step());
        }
        reports
    }

    /// Queue a broadcast: the sender gets its completion next tick, every
    /// other started node receives the frame after the flight delay
    /// unless the loss process eats it.
    fn broadcast(&mut self, sender: usize, channel: ChannelId, frame: Vec<u8>) {
        self.in_flight.push(Delivery {
            due: self.now + 1,
            target: sender,
            event: LinkEvent::Sent { channel },
        });

        for target in 0..self.nodes.len() {
            if target == sender || !self.nodes[target].node.is_started() {
                continue;
            }
            if self.config.loss_permille > 0
                && self.loss_rng.next_below(1000) < u64::from(self.config.loss_permille)
            {
                debug!(sender, target, "frame lost");
                continue;
            }
            self.in_flight.push(Delivery {
                due: self.now + self.config.delay_ticks,
                target,
                event: LinkEvent::Received {
                    channel,
                    frame: frame.clone(),
                },
            });
        }
    }
}

/// One epoch's statistics from one node, with the derived size estimate.
#[derive(Debug, Clone, Serialize)]
pub struct EpochRecord {
    /// Reporting node.
    pub node: usize,
    /// Epoch the statistics summarize.
    pub epoch: i16,
    /// Estimated network size.
    pub estimate: f64,
    /// The raw per-column statistics.
    pub columns: Vec<census_math::Fractional48>,
}

/// The simulation's collected output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimReport {
    /// Every statistics record, in emission order.
    pub records: Vec<EpochRecord>,
}

impl SimReport {
    /// Fold a simulation event stream into statistics records.
    pub fn from_events(events: &[SimEvent], rows: usize) -> Self {
        let records = events
            .iter()
            .filter_map(|e| match &e.event {
                NodeEvent::Stats(stats) => Some(EpochRecord {
                    node: e.node,
                    epoch: stats.epoch,
                    estimate: stats.estimate_size(rows),
                    columns: stats.columns.clone(),
                }),
                _ => None,
            })
            .collect();
        Self { records }
    }
}
