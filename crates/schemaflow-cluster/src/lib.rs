pub mod client;
pub mod error;
pub mod memory;

pub use client::ClusterClient;
pub use error::{ClusterError, ClusterResult};
pub use memory::MemoryCluster;
