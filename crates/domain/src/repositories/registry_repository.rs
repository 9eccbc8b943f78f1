use crate::entities::{FileDeclaration, FileHolders, FileMeta, FileSummary, RegisteredFile};
use crate::errors::DomainError;
use async_trait::async_trait;

/// Durable mapping of files, peers and which peer holds which piece.
///
/// A single trait rather than one per entity because announces must
/// commit the peer upsert and every declared piece row in one
/// transaction.
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    /// Insert a file with its per-piece checksums. Duplicate
    /// `file_hash` returns the existing record with `created = false`.
    async fn register_file(
        &self,
        file: &FileMeta,
        piece_hashes: &[String],
    ) -> Result<RegisteredFile, DomainError>;

    async fn list_files(&self) -> Result<Vec<FileSummary>, DomainError>;

    /// Upsert the peer identified by `(ip, port)` and record every
    /// declared piece. All-or-nothing: any unknown file hash or
    /// out-of-range piece index rolls back the entire announce.
    async fn record_announce(
        &self,
        ip: &str,
        port: u16,
        declarations: &[FileDeclaration],
    ) -> Result<(), DomainError>;

    /// The availability join for one file: every `(piece, peer)` pair
    /// plus the registered piece checksums.
    async fn piece_holders(&self, file_hash: &str) -> Result<FileHolders, DomainError>;
}
