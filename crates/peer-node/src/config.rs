use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub tracker_url: String,
    pub host: String,
    pub port: u16,
    pub download_dir: String,
    pub piece_length: usize,
    pub fetch_timeout_secs: u64,
    pub announce_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Config {
            tracker_url: env::var("TRACKER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5500".to_string()),

            host: env::var("PEER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PEER_PORT")
                .unwrap_or_else(|_| "5501".to_string())
                .parse()
                .unwrap_or(5501),

            download_dir: env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "downloads".to_string()),

            piece_length: env::var("PIECE_LENGTH")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),

            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            announce_interval_secs: env::var("ANNOUNCE_INTERVAL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_secs)
    }
}
