use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub peer_activity_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Config {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tracker.db".to_string()),

            host: env::var("TRACKER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("TRACKER_PORT")
                .unwrap_or_else(|_| "5500".to_string())
                .parse()
                .unwrap_or(5500),

            peer_activity_window_secs: env::var("PEER_ACTIVITY_WINDOW_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
        }
    }

    /// Zero disables the liveness filter entirely.
    pub fn activity_window(&self) -> Option<Duration> {
        if self.peer_activity_window_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.peer_activity_window_secs))
        }
    }
}
