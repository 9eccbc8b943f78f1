use application::PeerApp;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
use config::Config;

#[derive(Parser)]
#[command(name = "peer-node", about = "Seed and download files through the pieceswarm tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the given files and serve their pieces to other peers
    Serve {
        /// Local files to split, register and announce
        files: Vec<PathBuf>,
    },
    /// Download a file by name, merging availability across all of its
    /// registered content hashes
    Download {
        file_name: String,
    },
    /// List files known to the tracker
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "peer_node=debug,domain=debug".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let app = PeerApp::new(
        &config.tracker_url,
        config.port,
        &config.download_dir,
        config.fetch_timeout(),
    )
    .map_err(|e| anyhow::anyhow!("failed to initialize peer: {e}"))?;

    match cli.command {
        Command::Serve { files } => {
            for file in &files {
                let meta = app.seeder.seed_file(file, config.piece_length).await?;
                info!(
                    file_name = meta.file_name,
                    file_hash = meta.file_hash,
                    total_pieces = meta.total_pieces,
                    "seeded"
                );
            }

            let bind_address = format!("{}:{}", config.host, config.port);
            let listener = tokio::net::TcpListener::bind(&bind_address).await?;
            info!(
                files = ?app.store.file_names(),
                "Piece server listening on {}", bind_address
            );

            let server = app.spawn_piece_server(listener);

            // Re-announce periodically so the tracker keeps offering
            // this peer within its activity window.
            let keepalive = {
                let tracker = Arc::clone(&app.tracker);
                let port = config.port;
                let interval = config.announce_interval();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if let Err(e) = tracker.announce(None, port, &[]).await {
                            warn!("keepalive announce failed: {}", e);
                        }
                    }
                })
            };

            tokio::signal::ctrl_c().await?;
            server.abort();
            keepalive.abort();
            info!("Shutting down piece server");
        }
        Command::Download { file_name } => {
            let output = app.download_by_name(&file_name).await?;
            info!("Downloaded {} to {}", file_name, output.display());
        }
        Command::List => {
            let files = app.tracker.list_files().await?;
            if files.is_empty() {
                println!("No files registered with the tracker");
            }
            for file in files {
                println!(
                    "{}  {} ({} pieces)",
                    file.file_hash, file.file_name, file.total_pieces
                );
            }
        }
    }

    Ok(())
}
