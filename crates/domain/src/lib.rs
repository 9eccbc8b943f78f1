//! Core types and services for the piece-swarm file distribution
//! protocol: tracker logic, the peer wire protocol and the download
//! coordinator.

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod services;

pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
