//! Self-contained swarm demo: an in-process tracker, two partial
//! seeders on real TCP listeners and one downloader, verifying the
//! reassembled file byte-for-byte.

use application::TrackerApp;
use domain::{chunker, DownloadService, FileDeclaration, PieceServer, PieceStore, SwarmProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "local_swarm_demo=info,domain=info".to_string()),
        )
        .init();

    let work_dir = std::env::temp_dir().join(format!("pieceswarm-demo-{}", std::process::id()));
    tokio::fs::create_dir_all(&work_dir).await?;

    // A patterned source file, large enough for several pieces.
    let content: Vec<u8> = (0..8 * 1024u32).map(|i| (i % 251) as u8).collect();
    let source_path = work_dir.join("demo.bin");
    tokio::fs::write(&source_path, &content).await?;

    let tracker = TrackerApp::new(
        work_dir.join("tracker.db").to_str().expect("utf-8 temp path"),
        None,
    )?
    .tracker_service;

    let chunked = chunker::chunk_file(&source_path, 512).await?;
    info!(
        file_hash = chunked.file_hash,
        total_pieces = chunked.total_pieces(),
        "split demo file"
    );
    tracker
        .register_file(
            &chunked.file_name,
            &chunked.file_hash,
            chunked.piece_length,
            chunked.total_pieces(),
            &chunked.piece_hashes,
        )
        .await?;

    // Two seeders, each holding half the pieces.
    let mut seeder_ports = Vec::new();
    for parity in 0..2u32 {
        let store = Arc::new(PieceStore::new());
        let indices: Vec<u32> = chunked
            .all_indices()
            .into_iter()
            .filter(|index| index % 2 == parity)
            .collect();
        for &index in &indices {
            store.insert_piece(
                &chunked.file_name,
                index,
                chunked.pieces[index as usize].clone(),
            );
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            PieceServer::new(store).serve(listener).await;
        });

        tracker
            .announce(
                "127.0.0.1",
                port,
                &[FileDeclaration {
                    file_hash: chunked.file_hash.clone(),
                    pieces: indices.clone(),
                }],
            )
            .await?;
        info!(port, pieces = indices.len(), "seeder announced");
        seeder_ports.push(port);
    }

    let swarm = tracker.peers_for_piece(&chunked.file_hash).await?;
    info!(pieces = swarm.piece_count(), "swarm assembled");

    let provider: Arc<dyn SwarmProvider> = tracker;
    let downloader = DownloadService::new(provider, Duration::from_secs(10));
    let output_path = work_dir.join("downloaded").join(&chunked.file_name);
    downloader
        .download_file(
            &[chunked.file_hash.clone()],
            &chunked.file_name,
            chunked.total_pieces() as u32,
            &output_path,
        )
        .await?;

    let downloaded = tokio::fs::read(&output_path).await?;
    anyhow::ensure!(downloaded == content, "reassembled file differs from source");
    info!(
        bytes = downloaded.len(),
        seeders = seeder_ports.len(),
        path = %output_path.display(),
        "download verified byte-for-byte"
    );

    Ok(())
}
