pub mod heartbeat;
pub mod node_service;

pub use heartbeat::{spawn_heartbeat, HEARTBEAT_PERIOD};
pub use node_service::{node_register_bank, NodeHardware, NodeService};
