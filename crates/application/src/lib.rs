use domain::*;
use infrastructure::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Tracker side: registry store plus the stateless tracker service.
pub struct TrackerApp {
    pub tracker_service: Arc<TrackerService>,
}

impl TrackerApp {
    /// `activity_window` controls how long a peer stays a download
    /// candidate after its last announce; `None` keeps every peer.
    pub fn new(
        database_path: &str,
        activity_window: Option<Duration>,
    ) -> Result<Self, DomainError> {
        let database = Database::new(database_path);
        database.run_migrations()?;

        let registry: Arc<dyn RegistryRepository> =
            Arc::new(SqliteRegistryRepository::new(database.get_pool().clone()));
        let tracker_service = Arc::new(TrackerService::new(registry, activity_window));

        Ok(Self { tracker_service })
    }
}

/// Peer side: piece store, tracker client, seeder and downloader.
pub struct PeerApp {
    pub store: Arc<PieceStore>,
    pub tracker: Arc<HttpTrackerClient>,
    pub seeder: SeederService,
    pub downloader: DownloadService,
    download_dir: PathBuf,
}

impl PeerApp {
    pub fn new(
        tracker_url: &str,
        listen_port: u16,
        download_dir: impl Into<PathBuf>,
        fetch_timeout: Duration,
    ) -> Result<Self, DomainError> {
        let store = Arc::new(PieceStore::new());
        let tracker = Arc::new(HttpTrackerClient::new(tracker_url)?);

        let seeder = SeederService::new(Arc::clone(&store), Arc::clone(&tracker), listen_port);
        let provider: Arc<dyn SwarmProvider> = Arc::clone(&tracker) as Arc<dyn SwarmProvider>;
        let downloader = DownloadService::new(provider, fetch_timeout);

        Ok(Self {
            store,
            tracker,
            seeder,
            downloader,
            download_dir: download_dir.into(),
        })
    }

    /// Run the piece server on an already-bound listener. The server
    /// loops forever; drop the handle to detach, abort it to stop.
    pub fn spawn_piece_server(&self, listener: TcpListener) -> JoinHandle<()> {
        let server = PieceServer::new(Arc::clone(&self.store));
        tokio::spawn(async move {
            server.serve(listener).await;
        })
    }

    /// Download a file by name: discover every content hash the
    /// tracker knows it under, merge their swarms and reassemble into
    /// the download directory.
    pub async fn download_by_name(&self, file_name: &str) -> Result<PathBuf, DomainError> {
        let listing = self.tracker.list_files().await?;
        let (total_pieces, hashes) = DownloadService::resolve_by_name(&listing, file_name)?;

        let output = self.download_dir.join(file_name);
        self.downloader
            .download_file(&hashes, file_name, total_pieces as u32, &output)
            .await?;
        Ok(output)
    }
}
