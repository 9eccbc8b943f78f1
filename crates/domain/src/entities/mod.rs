pub mod file;
pub mod peer;
pub mod piece_store;
pub mod swarm;

pub use file::*;
pub use peer::*;
pub use piece_store::*;
pub use swarm::*;
