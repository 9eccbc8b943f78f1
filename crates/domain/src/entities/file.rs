use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: Option<i32>,
    pub file_name: String,
    pub file_hash: String, // SHA1 of the file content as hex string
    pub piece_length: i32,
    pub total_pieces: i32,
}

impl FileMeta {
    pub fn new(file_name: String, file_hash: String, piece_length: i32, total_pieces: i32) -> Self {
        Self {
            id: None,
            file_name,
            file_hash,
            piece_length,
            total_pieces,
        }
    }
}

/// Listing entry returned by the tracker for file discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_hash: String,
    pub file_name: String,
    pub total_pieces: i32,
}

/// Outcome of a file registration. Registering an already known hash is
/// not an error; the original record comes back with `created = false`.
#[derive(Debug, Clone)]
pub struct RegisteredFile {
    pub file: FileMeta,
    pub created: bool,
}
