use crate::entities::{FileDeclaration, FileMeta, FileSummary, RegisteredFile, Swarm};
use crate::errors::DomainError;
use crate::repositories::RegistryRepository;
use crate::services::download_service::SwarmProvider;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Stateless request handler wrapping the registry store.
///
/// Answers "who has piece N of file X", accepts peer announcements and
/// file registrations. Per-request atomicity comes from the registry;
/// no cross-request state lives here.
pub struct TrackerService {
    registry: Arc<dyn RegistryRepository>,
    activity_window: Option<chrono::Duration>,
}

impl TrackerService {
    /// `activity_window` bounds how stale a peer's last announce may be
    /// before it stops being offered as a download candidate; `None`
    /// disables the filter.
    pub fn new(registry: Arc<dyn RegistryRepository>, activity_window: Option<Duration>) -> Self {
        let activity_window = activity_window
            .and_then(|window| chrono::Duration::from_std(window).ok());
        Self {
            registry,
            activity_window,
        }
    }

    /// Register a file's metadata and per-piece checksums. Registering
    /// the same content hash twice returns the original record.
    pub async fn register_file(
        &self,
        file_name: &str,
        file_hash: &str,
        piece_length: i32,
        total_pieces: i32,
        piece_hashes: &[String],
    ) -> Result<RegisteredFile, DomainError> {
        if file_name.is_empty() {
            return Err(DomainError::ValidationError(
                "File name is required".to_string(),
            ));
        }
        if file_hash.is_empty() {
            return Err(DomainError::ValidationError(
                "File hash is required".to_string(),
            ));
        }
        if piece_length < 1 {
            return Err(DomainError::ValidationError(
                "Piece length must be at least 1".to_string(),
            ));
        }
        if total_pieces < 1 {
            return Err(DomainError::ValidationError(
                "A file must have at least one piece".to_string(),
            ));
        }
        if piece_hashes.len() != total_pieces as usize {
            return Err(DomainError::ValidationError(format!(
                "Expected {} piece hashes, got {}",
                total_pieces,
                piece_hashes.len()
            )));
        }

        let meta = FileMeta::new(
            file_name.to_string(),
            file_hash.to_string(),
            piece_length,
            total_pieces,
        );
        let registered = self.registry.register_file(&meta, piece_hashes).await?;
        if registered.created {
            info!(file_name, file_hash, total_pieces, "registered new file");
        } else {
            debug!(file_hash, "file already registered");
        }
        Ok(registered)
    }

    /// Record a peer's address and the pieces it currently serves.
    /// The registry commits the whole announce or none of it.
    pub async fn announce(
        &self,
        ip: &str,
        port: u16,
        declarations: &[FileDeclaration],
    ) -> Result<(), DomainError> {
        if ip.is_empty() {
            return Err(DomainError::ValidationError("IP is required".to_string()));
        }
        if port == 0 {
            return Err(DomainError::ValidationError("Port is required".to_string()));
        }
        for declaration in declarations {
            if declaration.file_hash.is_empty() {
                return Err(DomainError::ValidationError(
                    "File hash is required".to_string(),
                ));
            }
        }

        self.registry.record_announce(ip, port, declarations).await?;
        debug!(ip, port, files = declarations.len(), "announce recorded");
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<FileSummary>, DomainError> {
        self.registry.list_files().await
    }

    /// The central availability query: peer addresses grouped by piece
    /// index, with peers outside the activity window dropped.
    pub async fn peers_for_piece(&self, file_hash: &str) -> Result<Swarm, DomainError> {
        if file_hash.is_empty() {
            return Err(DomainError::ValidationError(
                "File hash is required".to_string(),
            ));
        }

        let holders = self.registry.piece_holders(file_hash).await?;
        let cutoff = self.activity_window.map(|window| Utc::now() - window);

        let mut pieces: HashMap<u32, Vec<String>> = HashMap::new();
        for holder in holders.holders {
            if let Some(cutoff) = cutoff {
                if !holder.peer.is_active_since(cutoff) {
                    debug!(
                        addr = holder.peer.socket_addr(),
                        piece = holder.piece_index,
                        "dropping stale peer from swarm"
                    );
                    continue;
                }
            }
            let addr = holder.peer.socket_addr();
            let entry = pieces.entry(holder.piece_index).or_default();
            if !entry.contains(&addr) {
                entry.push(addr);
            }
        }

        Ok(Swarm {
            file_name: holders.file.file_name,
            file_hash: holders.file.file_hash,
            pieces,
            piece_hashes: holders.piece_hashes,
        })
    }
}

#[async_trait]
impl SwarmProvider for TrackerService {
    async fn swarm_for_file(&self, file_hash: &str) -> Result<Swarm, DomainError> {
        self.peers_for_piece(file_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FileHolders, Peer, PieceHolder};
    use std::sync::Mutex;

    /// Registry stub recording calls and serving canned holders.
    struct StubRegistry {
        files: Mutex<Vec<FileMeta>>,
        holders: Mutex<HashMap<String, FileHolders>>,
    }

    impl StubRegistry {
        fn new() -> Self {
            Self {
                files: Mutex::new(Vec::new()),
                holders: Mutex::new(HashMap::new()),
            }
        }

        fn with_holders(file: FileMeta, holders: Vec<PieceHolder>) -> Self {
            let stub = Self::new();
            stub.holders.lock().unwrap().insert(
                file.file_hash.clone(),
                FileHolders {
                    file,
                    holders,
                    piece_hashes: HashMap::new(),
                },
            );
            stub
        }
    }

    #[async_trait]
    impl RegistryRepository for StubRegistry {
        async fn register_file(
            &self,
            file: &FileMeta,
            _piece_hashes: &[String],
        ) -> Result<RegisteredFile, DomainError> {
            let mut files = self.files.lock().unwrap();
            if let Some(existing) = files.iter().find(|f| f.file_hash == file.file_hash) {
                return Ok(RegisteredFile {
                    file: existing.clone(),
                    created: false,
                });
            }
            let mut stored = file.clone();
            stored.id = Some(files.len() as i32 + 1);
            files.push(stored.clone());
            Ok(RegisteredFile {
                file: stored,
                created: true,
            })
        }

        async fn list_files(&self) -> Result<Vec<FileSummary>, DomainError> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .iter()
                .map(|f| FileSummary {
                    file_hash: f.file_hash.clone(),
                    file_name: f.file_name.clone(),
                    total_pieces: f.total_pieces,
                })
                .collect())
        }

        async fn record_announce(
            &self,
            _ip: &str,
            _port: u16,
            _declarations: &[FileDeclaration],
        ) -> Result<(), DomainError> {
            Ok(())
        }

        async fn piece_holders(&self, file_hash: &str) -> Result<FileHolders, DomainError> {
            self.holders
                .lock()
                .unwrap()
                .get(file_hash)
                .cloned()
                .ok_or_else(|| DomainError::FileNotFoundByHash(file_hash.to_string()))
        }
    }

    fn holder(index: u32, ip: &str, port: u16, last_active: chrono::DateTime<Utc>) -> PieceHolder {
        PieceHolder {
            piece_index: index,
            peer: Peer {
                id: None,
                ip: ip.to_string(),
                port,
                last_active,
            },
        }
    }

    #[tokio::test]
    async fn registration_is_idempotent_on_duplicate_hash() {
        let service = TrackerService::new(Arc::new(StubRegistry::new()), None);
        let hashes = vec![String::from("p0"), String::from("p1")];

        let first = service
            .register_file("a.txt", "abc123", 512, 2, &hashes)
            .await
            .unwrap();
        let second = service
            .register_file("a.txt", "abc123", 512, 2, &hashes)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.file.id, second.file.id);
    }

    #[tokio::test]
    async fn rejects_file_without_pieces() {
        let service = TrackerService::new(Arc::new(StubRegistry::new()), None);
        let err = service
            .register_file("a.txt", "abc123", 512, 0, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_piece_hash_count_mismatch() {
        let service = TrackerService::new(Arc::new(StubRegistry::new()), None);
        let err = service
            .register_file("a.txt", "abc123", 512, 3, &[String::from("only-one")])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn announce_requires_port() {
        let service = TrackerService::new(Arc::new(StubRegistry::new()), None);
        let err = service.announce("127.0.0.1", 0, &[]).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[tokio::test]
    async fn groups_holders_by_piece_index() {
        let file = FileMeta::new("a.txt".to_string(), "h1".to_string(), 1, 3);
        let now = Utc::now();
        let registry = StubRegistry::with_holders(
            file,
            vec![
                holder(0, "10.0.0.1", 7000, now),
                holder(1, "10.0.0.2", 7001, now),
                holder(0, "10.0.0.2", 7001, now),
            ],
        );
        let service = TrackerService::new(Arc::new(registry), None);

        let swarm = service.peers_for_piece("h1").await.unwrap();
        assert_eq!(swarm.file_name, "a.txt");
        assert_eq!(swarm.pieces[&0].len(), 2);
        assert_eq!(swarm.pieces[&1], vec!["10.0.0.2:7001".to_string()]);
        assert!(!swarm.pieces.contains_key(&2));
    }

    #[tokio::test]
    async fn stale_peers_are_not_candidates() {
        let file = FileMeta::new("a.txt".to_string(), "h1".to_string(), 1, 2);
        let now = Utc::now();
        let stale = now - chrono::Duration::hours(2);
        let registry = StubRegistry::with_holders(
            file,
            vec![holder(0, "10.0.0.1", 7000, now), holder(1, "10.0.0.2", 7001, stale)],
        );
        let service =
            TrackerService::new(Arc::new(registry), Some(Duration::from_secs(30 * 60)));

        let swarm = service.peers_for_piece("h1").await.unwrap();
        assert!(swarm.pieces.contains_key(&0));
        assert!(!swarm.pieces.contains_key(&1));
    }

    #[tokio::test]
    async fn unknown_hash_is_not_found() {
        let service = TrackerService::new(Arc::new(StubRegistry::new()), None);
        let err = service.peers_for_piece("nope").await.unwrap_err();
        assert!(matches!(err, DomainError::FileNotFoundByHash(_)));
    }
}
