use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// In-memory piece bytes held by a seeding peer, keyed by file name.
///
/// Populated by the seeder before the piece server starts accepting
/// connections; read-only on the serving path, so concurrent reads
/// from connection tasks never race a writer.
#[derive(Debug, Default)]
pub struct PieceStore {
    files: RwLock<HashMap<String, BTreeMap<u32, Vec<u8>>>>,
}

impl PieceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a complete run of pieces for a file, indexed from zero.
    pub fn insert_file(&self, file_name: &str, pieces: Vec<Vec<u8>>) {
        let mut files = self.files.write().unwrap();
        let entry = files.entry(file_name.to_string()).or_default();
        for (index, data) in pieces.into_iter().enumerate() {
            entry.insert(index as u32, data);
        }
    }

    /// Store a single piece; used for partial seeding.
    pub fn insert_piece(&self, file_name: &str, piece_index: u32, data: Vec<u8>) {
        let mut files = self.files.write().unwrap();
        files
            .entry(file_name.to_string())
            .or_default()
            .insert(piece_index, data);
    }

    pub fn contains_file(&self, file_name: &str) -> bool {
        self.files.read().unwrap().contains_key(file_name)
    }

    pub fn piece(&self, file_name: &str, piece_index: u32) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(file_name)
            .and_then(|pieces| pieces.get(&piece_index))
            .cloned()
    }

    /// Indices held for a file, in ascending order.
    pub fn piece_indices(&self, file_name: &str) -> Vec<u32> {
        self.files
            .read()
            .unwrap()
            .get(file_name)
            .map(|pieces| pieces.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.read().unwrap().keys().cloned().collect()
    }
}
