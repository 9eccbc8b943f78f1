use crate::entities::{FileSummary, Swarm};
use crate::errors::DomainError;
use crate::services::chunker::sha1_hex;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Source of piece availability for a file hash. Implemented by the
/// HTTP tracker client and, for in-process use, by the tracker service
/// itself.
#[async_trait]
pub trait SwarmProvider: Send + Sync {
    async fn swarm_for_file(&self, file_hash: &str) -> Result<Swarm, DomainError>;
}

/// Fans piece fetches out across the swarm and reassembles the file.
///
/// One fetch task per piece; tasks report `(piece_index, result)` back
/// through their join handles and share no mutable state. The single
/// barrier is the join before assembly.
pub struct DownloadService {
    provider: Arc<dyn SwarmProvider>,
    fetch_timeout: Duration,
}

impl DownloadService {
    pub fn new(provider: Arc<dyn SwarmProvider>, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            fetch_timeout,
        }
    }

    /// Download one logical file that may be registered under several
    /// content hashes (one per original seeder). Piece availability is
    /// merged across all hashes; every piece is fetched exactly once
    /// from one peer and written out in ascending index order.
    ///
    /// No output file is created unless every piece arrives.
    pub async fn download_file(
        &self,
        file_hashes: &[String],
        file_name: &str,
        total_pieces: u32,
        output_path: &Path,
    ) -> Result<(), DomainError> {
        let (mut candidates, piece_hashes) = self.aggregate_availability(file_hashes).await;
        // A swarm response may only name indices inside the file;
        // anything else must not reach the fetch fan-out.
        candidates.retain(|&piece_index, _| piece_index < total_pieces);

        let missing = missing_indices(total_pieces, |index| candidates.contains_key(&index));
        if !missing.is_empty() {
            warn!(file_name, ?missing, "pieces unavailable in swarm");
            return Err(DomainError::DownloadIncomplete(missing));
        }

        let mut tasks = Vec::with_capacity(candidates.len());
        for (piece_index, addrs) in candidates {
            let file_name = file_name.to_string();
            let expected_hash = piece_hashes.get(&piece_index).cloned();
            let timeout = self.fetch_timeout;
            tasks.push(tokio::spawn(async move {
                let data = fetch_from_candidates(
                    &file_name,
                    piece_index,
                    &addrs,
                    expected_hash.as_deref(),
                    timeout,
                )
                .await;
                (piece_index, data)
            }));
        }

        // Barrier: wait for every fetch task, then build the result map
        // in one place.
        let mut collected: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok((piece_index, Some(data))) => {
                    collected.insert(piece_index, data);
                }
                Ok((_, None)) => {}
                Err(e) => warn!("fetch task panicked: {}", e),
            }
        }

        let missing = missing_indices(total_pieces, |index| collected.contains_key(&index));
        if !missing.is_empty() {
            warn!(file_name, ?missing, "pieces failed to download");
            return Err(DomainError::DownloadIncomplete(missing));
        }

        write_assembled(&collected, output_path).await?;
        info!(file_name, total_pieces, path = %output_path.display(), "download complete");
        Ok(())
    }

    /// Union piece availability across every hash in the group. A hash
    /// the tracker cannot resolve is skipped, not fatal; the missing
    /// check decides whether enough coverage remains.
    async fn aggregate_availability(
        &self,
        file_hashes: &[String],
    ) -> (HashMap<u32, Vec<String>>, HashMap<u32, String>) {
        let mut candidates: HashMap<u32, Vec<String>> = HashMap::new();
        let mut piece_hashes: HashMap<u32, String> = HashMap::new();

        for file_hash in file_hashes {
            let swarm = match self.provider.swarm_for_file(file_hash).await {
                Ok(swarm) => swarm,
                Err(e) => {
                    warn!(file_hash, "skipping hash, availability query failed: {}", e);
                    continue;
                }
            };
            for (piece_index, addrs) in swarm.pieces {
                let entry = candidates.entry(piece_index).or_default();
                for addr in addrs {
                    if !entry.contains(&addr) {
                        entry.push(addr);
                    }
                }
            }
            for (piece_index, hash) in swarm.piece_hashes {
                piece_hashes.entry(piece_index).or_insert(hash);
            }
        }

        (candidates, piece_hashes)
    }

    /// Resolve a file name against a tracker listing to the piece
    /// count and the full set of content hashes it is registered
    /// under. Two distinct files sharing a name (different piece
    /// counts) are an error, not a coin flip.
    pub fn resolve_by_name(
        files: &[FileSummary],
        file_name: &str,
    ) -> Result<(i32, Vec<String>), DomainError> {
        let mut matching: Vec<_> = Self::group_by_identity(files)
            .into_iter()
            .filter(|(key, _)| key.0 == file_name)
            .collect();

        match matching.len() {
            0 => Err(DomainError::NotFound(format!(
                "No file named {}",
                file_name
            ))),
            1 => {
                let ((_, total_pieces), hashes) = matching.remove(0);
                Ok((total_pieces, hashes))
            }
            n => Err(DomainError::ValidationError(format!(
                "{} distinct files are registered under the name {}",
                n, file_name
            ))),
        }
    }

    /// Hashes describing the same logical file, grouped by
    /// `(file_name, total_pieces)` — one entry per distinct seeded
    /// file, each carrying every content hash it is registered under.
    pub fn group_by_identity(files: &[FileSummary]) -> HashMap<(String, i32), Vec<String>> {
        let mut groups: HashMap<(String, i32), Vec<String>> = HashMap::new();
        for file in files {
            let key = (file.file_name.clone(), file.total_pieces);
            let hashes = groups.entry(key).or_default();
            if !hashes.contains(&file.file_hash) {
                hashes.push(file.file_hash.clone());
            }
        }
        groups
    }
}

fn missing_indices(total_pieces: u32, mut present: impl FnMut(u32) -> bool) -> Vec<u32> {
    (0..total_pieces).filter(|&index| !present(index)).collect()
}

/// Walk the candidate peers for one piece in first-seen order. Timeout,
/// transport failure and checksum mismatch all fail the attempt and
/// move on to the next candidate; they never abort sibling pieces.
async fn fetch_from_candidates(
    file_name: &str,
    piece_index: u32,
    addrs: &[String],
    expected_hash: Option<&str>,
    timeout: Duration,
) -> Option<Vec<u8>> {
    for addr in addrs {
        let attempt = fetch_verified(addr, file_name, piece_index, expected_hash);
        match tokio::time::timeout(timeout, attempt).await {
            Err(_) => {
                warn!(addr, piece_index, "piece fetch timed out");
            }
            Ok(Err(e)) => {
                warn!(addr, piece_index, "piece fetch failed: {}", e);
            }
            Ok(Ok(data)) => {
                debug!(addr, piece_index, bytes = data.len(), "piece fetched");
                return Some(data);
            }
        }
    }
    warn!(piece_index, "no candidate peer could serve the piece");
    None
}

async fn fetch_verified(
    addr: &str,
    file_name: &str,
    piece_index: u32,
    expected_hash: Option<&str>,
) -> Result<Vec<u8>, DomainError> {
    let data = fetch_piece(addr, file_name, piece_index).await?;
    if let Some(expected) = expected_hash {
        if sha1_hex(&data) != expected {
            return Err(DomainError::PieceVerificationFailed(piece_index));
        }
    }
    Ok(data)
}

/// One request per connection: send the request line, then read the
/// raw payload until the peer closes the socket.
async fn fetch_piece(addr: &str, file_name: &str, piece_index: u32) -> Result<Vec<u8>, DomainError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| DomainError::TransportError(format!("Failed to connect to {}: {}", addr, e)))?;

    let request = format!("GET {} {}\n", piece_index, file_name);
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| DomainError::TransportError(format!("Failed to send request: {}", e)))?;

    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .await
        .map_err(|e| DomainError::TransportError(format!("Failed to read response: {}", e)))?;

    if data.is_empty() {
        return Err(DomainError::TransportError(format!(
            "Peer {} closed the connection without data",
            addr
        )));
    }
    if data.starts_with(b"ERROR: ") {
        let reason = String::from_utf8_lossy(&data[7..]).trim().to_string();
        return Err(DomainError::TransportError(format!(
            "Peer {} refused: {}",
            addr, reason
        )));
    }

    Ok(data)
}

async fn write_assembled(
    pieces: &BTreeMap<u32, Vec<u8>>,
    output_path: &Path,
) -> Result<(), DomainError> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::IoError(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
    }

    let mut file = tokio::fs::File::create(output_path)
        .await
        .map_err(|e| DomainError::IoError(format!("Failed to create {}: {}", output_path.display(), e)))?;

    // BTreeMap iterates in ascending index order; completion order of
    // the fetch tasks never reaches this point.
    for data in pieces.values() {
        file.write_all(data)
            .await
            .map_err(|e| DomainError::IoError(format!("Failed to write piece data: {}", e)))?;
    }
    file.flush()
        .await
        .map_err(|e| DomainError::IoError(format!("Failed to flush file: {}", e)))?;

    Ok(())
}
