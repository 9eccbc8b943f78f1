use crate::entities::FileMeta;
use crate::errors::DomainError;
use sha1::{Digest, Sha1};
use std::path::Path;

/// A local file split into transferable pieces.
///
/// `file_hash` is SHA1 over the whole content and nothing else, so the
/// same file seeded from different peers hashes identically and their
/// swarms can be merged.
#[derive(Debug, Clone)]
pub struct ChunkedFile {
    pub file_name: String,
    pub file_hash: String,
    pub piece_length: i32,
    pub pieces: Vec<Vec<u8>>,
    pub piece_hashes: Vec<String>,
}

impl ChunkedFile {
    pub fn total_pieces(&self) -> i32 {
        self.pieces.len() as i32
    }

    pub fn to_meta(&self) -> FileMeta {
        FileMeta::new(
            self.file_name.clone(),
            self.file_hash.clone(),
            self.piece_length,
            self.total_pieces(),
        )
    }

    pub fn all_indices(&self) -> Vec<u32> {
        (0..self.pieces.len() as u32).collect()
    }
}

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Split a file into `piece_length`-sized pieces; the last piece may be
/// shorter. An empty file cannot be shared (total_pieces must be >= 1).
pub async fn chunk_file(path: &Path, piece_length: usize) -> Result<ChunkedFile, DomainError> {
    if piece_length == 0 {
        return Err(DomainError::ValidationError(
            "Piece length must be at least 1".to_string(),
        ));
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            DomainError::ValidationError(format!("Invalid file path: {}", path.display()))
        })?
        .to_string();

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| DomainError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

    if data.is_empty() {
        return Err(DomainError::ValidationError(format!(
            "File {} is empty and cannot be shared",
            file_name
        )));
    }

    let file_hash = sha1_hex(&data);
    let pieces: Vec<Vec<u8>> = data.chunks(piece_length).map(|c| c.to_vec()).collect();
    let piece_hashes = pieces.iter().map(|p| sha1_hex(p)).collect();

    Ok(ChunkedFile {
        file_name,
        file_hash,
        piece_length: piece_length as i32,
        pieces,
        piece_hashes,
    })
}
