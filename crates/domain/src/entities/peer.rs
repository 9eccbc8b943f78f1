use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: Option<i32>,
    pub ip: String,
    pub port: u16,
    pub last_active: DateTime<Utc>,
}

impl Peer {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Whether the peer announced recently enough to be offered as a
    /// download candidate.
    pub fn is_active_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_active >= cutoff
    }
}
