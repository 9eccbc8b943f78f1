use crate::entities::PieceStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

// Request lines are a handful of bytes; a connection may not feed an
// unbounded line into memory.
const MAX_REQUEST_LINE: u64 = 1024;

const ERR_INVALID_REQUEST: &[u8] = b"ERROR: Invalid request";
const ERR_FILE_NOT_FOUND: &[u8] = b"ERROR: File not found";
const ERR_PIECE_NOT_FOUND: &[u8] = b"ERROR: Piece not found";

/// Serves raw piece bytes to other peers from the local piece store.
///
/// One task per accepted connection; each connection answers exactly
/// one `GET <piece_index> <file_name>` request and then closes. The
/// response is either the raw piece payload (terminated by connection
/// close) or a literal `ERROR: <reason>` line.
pub struct PieceServer {
    store: Arc<PieceStore>,
}

impl PieceServer {
    pub fn new(store: Arc<PieceStore>) -> Self {
        Self { store }
    }

    /// Accept loop. Connection-level failures are logged and never
    /// bring the listener down.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "peer connected");
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(store, stream).await {
                            warn!(%addr, "connection failed: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(store: Arc<PieceStore>, stream: TcpStream) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();

    let mut line = String::new();
    let mut reader = BufReader::new(read_half).take(MAX_REQUEST_LINE);
    reader.read_line(&mut line).await?;

    let response = match parse_request(&line) {
        Some((piece_index, file_name)) => {
            if !store.contains_file(file_name) {
                debug!(file_name, "requested unknown file");
                ERR_FILE_NOT_FOUND.to_vec()
            } else {
                match store.piece(file_name, piece_index) {
                    Some(data) => {
                        debug!(file_name, piece_index, bytes = data.len(), "serving piece");
                        data
                    }
                    None => {
                        debug!(file_name, piece_index, "requested unknown piece");
                        ERR_PIECE_NOT_FOUND.to_vec()
                    }
                }
            }
        }
        None => {
            debug!(request = line.trim(), "malformed request line");
            ERR_INVALID_REQUEST.to_vec()
        }
    };

    write_half.write_all(&response).await?;
    write_half.shutdown().await?;
    Ok(())
}

/// `GET <piece_index> <file_name>` — the file name may contain spaces,
/// everything after the index belongs to it.
fn parse_request(line: &str) -> Option<(u32, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(3, ' ');
    let command = parts.next()?;
    if command != "GET" {
        return None;
    }
    let piece_index = parts.next()?.parse::<u32>().ok()?;
    let file_name = parts.next()?;
    if file_name.is_empty() {
        return None;
    }
    Some((piece_index, file_name))
}
