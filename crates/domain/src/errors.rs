use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("File not found with hash: {0}")]
    FileNotFoundByHash(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Download incomplete: missing pieces {0:?}")]
    DownloadIncomplete(Vec<u32>),

    #[error("Piece verification failed: piece {0}")]
    PieceVerificationFailed(u32),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Repository error: {0}")]
    RepositoryError(String),

    #[error("IO error: {0}")]
    IoError(String),
}
