pub mod chunker;
pub mod download_service;
pub mod piece_server;
pub mod seeder_service;
pub mod tracker_client;
pub mod tracker_service;

pub use chunker::ChunkedFile;
pub use download_service::{DownloadService, SwarmProvider};
pub use piece_server::PieceServer;
pub use seeder_service::SeederService;
pub use tracker_client::HttpTrackerClient;
pub use tracker_service::TrackerService;
