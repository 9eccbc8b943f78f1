use crate::entities::{FileMeta, Peer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A peer's claim that it can serve the listed pieces of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDeclaration {
    pub file_hash: String,
    pub pieces: Vec<u32>,
}

/// One row of the availability join: a peer holding one piece.
#[derive(Debug, Clone)]
pub struct PieceHolder {
    pub piece_index: u32,
    pub peer: Peer,
}

/// Raw registry answer for a file, before grouping and liveness
/// filtering happen in the tracker service.
#[derive(Debug, Clone)]
pub struct FileHolders {
    pub file: FileMeta,
    pub holders: Vec<PieceHolder>,
    pub piece_hashes: HashMap<u32, String>,
}

/// Piece availability for one file, grouped by piece index.
///
/// Ordering of addresses within a piece's list is not meaningful;
/// callers must not assume a primary peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Swarm {
    pub file_name: String,
    pub file_hash: String,
    pub pieces: HashMap<u32, Vec<String>>,
    #[serde(default)]
    pub piece_hashes: HashMap<u32, String>,
}

impl Swarm {
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }
}
