use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use domain::DomainError;

pub mod schema;
pub use schema::*;

pub type SqlitePool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

const TABLE_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name TEXT NOT NULL,
        file_hash TEXT NOT NULL UNIQUE,
        piece_length INTEGER NOT NULL,
        total_pieces INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS peers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ip TEXT NOT NULL,
        port INTEGER NOT NULL,
        last_active TIMESTAMP NOT NULL,
        UNIQUE (ip, port)
    )",
    "CREATE TABLE IF NOT EXISTS file_pieces (
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        peer_id INTEGER NOT NULL REFERENCES peers(id) ON DELETE CASCADE,
        piece_index INTEGER NOT NULL,
        PRIMARY KEY (file_id, peer_id, piece_index)
    )",
    "CREATE TABLE IF NOT EXISTS piece_hashes (
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        piece_index INTEGER NOT NULL,
        piece_hash TEXT NOT NULL,
        PRIMARY KEY (file_id, piece_index)
    )",
];

/// SQLite allows one writer at a time; pooled connections must wait
/// for the write lock instead of failing fast when announces and
/// registrations land concurrently.
#[derive(Debug)]
struct ConnectionOptions;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        diesel::sql_query("PRAGMA busy_timeout = 5000")
            .execute(conn)
            .map(|_| ())
            .map_err(r2d2::Error::QueryError)
    }
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(database_path: &str) -> Self {
        let manager = ConnectionManager::<SqliteConnection>::new(database_path);
        let pool = r2d2::Pool::builder()
            .connection_customizer(Box::new(ConnectionOptions))
            .build(manager)
            .expect("Failed to create SQLite connection pool");
        Database { pool }
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the registry tables if they do not exist yet.
    pub fn run_migrations(&self) -> Result<(), DomainError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| DomainError::RepositoryError(e.to_string()))?;

        for ddl in TABLE_DDL {
            diesel::sql_query(*ddl)
                .execute(&mut conn)
                .map_err(|e| DomainError::RepositoryError(e.to_string()))?;
        }
        Ok(())
    }
}
