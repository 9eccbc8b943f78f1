use crate::entities::{FileDeclaration, FileMeta, PieceStore};
use crate::errors::DomainError;
use crate::services::chunker;
use crate::services::tracker_client::HttpTrackerClient;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Splits local files into pieces, loads them into the piece store and
/// declares ownership to the tracker.
pub struct SeederService {
    store: Arc<PieceStore>,
    tracker: Arc<HttpTrackerClient>,
    listen_port: u16,
}

impl SeederService {
    /// `listen_port` is the port the local piece server answers on; it
    /// is what other peers will be told to connect to.
    pub fn new(store: Arc<PieceStore>, tracker: Arc<HttpTrackerClient>, listen_port: u16) -> Self {
        Self {
            store,
            tracker,
            listen_port,
        }
    }

    /// Seed a complete file: register its metadata, hold every piece
    /// and declare full ownership to the tracker.
    pub async fn seed_file(
        &self,
        path: &Path,
        piece_length: usize,
    ) -> Result<FileMeta, DomainError> {
        let chunked = chunker::chunk_file(path, piece_length).await?;
        let indices = chunked.all_indices();

        let registered = self
            .tracker
            .register_file(&chunked.to_meta(), &chunked.piece_hashes)
            .await?;

        self.store
            .insert_file(&chunked.file_name, chunked.pieces.clone());

        self.tracker
            .upload(
                self.listen_port,
                &[FileDeclaration {
                    file_hash: chunked.file_hash.clone(),
                    pieces: indices,
                }],
            )
            .await?;

        info!(
            file_name = chunked.file_name,
            file_hash = chunked.file_hash,
            pieces = chunked.pieces.len(),
            "seeding"
        );
        Ok(registered.file)
    }
}
