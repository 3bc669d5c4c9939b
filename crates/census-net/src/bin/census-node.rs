//! Run one census node over UDP.
//!
//! ```text
//! census-node BIND_ADDR NODE_ID PEER_ADDR [PEER_ADDR...]
//! ```
//!
//! `NODE_ID` is the node's 64-bit hardware id (hex); its low 32 bits must
//! be nonzero and unique per node.

use census_net::{run_node, UdpLink, UdpLinkConfig};
use census_node::{Node, NodeConfig, NodeEvent, NodeIdentity};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        anyhow::bail!("usage: census-node BIND_ADDR NODE_ID PEER_ADDR [PEER_ADDR...]");
    }

    let bind = args[1].parse()?;
    let id64 = u64::from_str_radix(args[2].trim_start_matches("0x"), 16)?;
    let peers = args[3..]
        .iter()
        .map(|a| a.parse())
        .collect::<Result<Vec<_>, _>>()?;

    let config = NodeConfig::default();
    let rows = config.estimator.rows;
    let node = Node::new(NodeIdentity::new(id64), config);
    let link = UdpLink::bind(UdpLinkConfig {
        bind,
        peers,
        ..Default::default()
    })
    .await?;

    run_node(node, link, move |event| {
        if let NodeEvent::Stats(stats) = event {
            println!(
                "epoch {:>4} estimate {:>6.2}",
                stats.epoch,
                stats.estimate_size(rows)
            );
        }
    })
    .await
}
