use crate::database::{file_pieces, files, peers, piece_hashes, SqlitePool};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use domain::{
    DomainError, FileDeclaration, FileHolders, FileMeta, FileSummary, Peer, PieceHolder,
    RegisteredFile, RegistryRepository,
};
use std::collections::HashMap;

// Database models
#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = files)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct FileModel {
    id: i32,
    file_name: String,
    file_hash: String,
    piece_length: i32,
    total_pieces: i32,
}

#[derive(Insertable)]
#[diesel(table_name = files)]
struct NewFileModel {
    file_name: String,
    file_hash: String,
    piece_length: i32,
    total_pieces: i32,
}

#[derive(Queryable, Debug)]
struct HolderRow {
    piece_index: i32,
    peer_id: i32,
    ip: String,
    port: i32,
    last_active: NaiveDateTime,
}

impl From<FileModel> for FileMeta {
    fn from(model: FileModel) -> Self {
        FileMeta {
            id: Some(model.id),
            file_name: model.file_name,
            file_hash: model.file_hash,
            piece_length: model.piece_length,
            total_pieces: model.total_pieces,
        }
    }
}

impl From<&FileMeta> for NewFileModel {
    fn from(file: &FileMeta) -> Self {
        NewFileModel {
            file_name: file.file_name.clone(),
            file_hash: file.file_hash.clone(),
            piece_length: file.piece_length,
            total_pieces: file.total_pieces,
        }
    }
}

impl From<HolderRow> for PieceHolder {
    fn from(row: HolderRow) -> Self {
        PieceHolder {
            piece_index: row.piece_index as u32,
            peer: Peer {
                id: Some(row.peer_id),
                ip: row.ip,
                port: row.port as u16,
                last_active: row.last_active.and_utc(),
            },
        }
    }
}

/// Error type for transaction closures: diesel failures roll back via
/// `From`, domain failures (unknown hash, bad index) are carried out
/// intact so callers see the right taxonomy.
enum TxError {
    Db(diesel::result::Error),
    Domain(DomainError),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        TxError::Db(e)
    }
}

impl From<TxError> for DomainError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Db(e) => DomainError::RepositoryError(e.to_string()),
            TxError::Domain(e) => e,
        }
    }
}

pub struct SqliteRegistryRepository {
    pool: SqlitePool,
}

impl SqliteRegistryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<
        diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>,
        DomainError,
    > {
        self.pool
            .get()
            .map_err(|e| DomainError::RepositoryError(e.to_string()))
    }
}

#[async_trait]
impl RegistryRepository for SqliteRegistryRepository {
    async fn register_file(
        &self,
        file: &FileMeta,
        hashes: &[String],
    ) -> Result<RegisteredFile, DomainError> {
        let mut conn = self.conn()?;
        let new_file = NewFileModel::from(file);
        let hashes = hashes.to_vec();

        let result = tokio::task::spawn_blocking(move || {
            conn.transaction::<RegisteredFile, TxError, _>(|conn| {
                // INSERT OR IGNORE arbitrates concurrent registrations
                // of one hash: zero affected rows means another writer
                // got there first and the existing record wins. A
                // check-then-insert would race between the check and
                // the insert.
                let inserted = diesel::insert_or_ignore_into(files::table)
                    .values(&new_file)
                    .execute(conn)?;

                let model = files::table
                    .filter(files::file_hash.eq(&new_file.file_hash))
                    .select(FileModel::as_select())
                    .first::<FileModel>(conn)?;

                if inserted == 0 {
                    return Ok(RegisteredFile {
                        file: model.into(),
                        created: false,
                    });
                }

                let hash_rows: Vec<_> = hashes
                    .iter()
                    .enumerate()
                    .map(|(index, hash)| {
                        (
                            piece_hashes::file_id.eq(model.id),
                            piece_hashes::piece_index.eq(index as i32),
                            piece_hashes::piece_hash.eq(hash),
                        )
                    })
                    .collect();
                diesel::insert_into(piece_hashes::table)
                    .values(&hash_rows)
                    .execute(conn)?;

                Ok(RegisteredFile {
                    file: model.into(),
                    created: true,
                })
            })
        })
        .await
        .map_err(|e| DomainError::RepositoryError(e.to_string()))?;

        result.map_err(DomainError::from)
    }

    async fn list_files(&self) -> Result<Vec<FileSummary>, DomainError> {
        let mut conn = self.conn()?;

        let result = tokio::task::spawn_blocking(move || {
            files::table
                .select((files::file_hash, files::file_name, files::total_pieces))
                .load::<(String, String, i32)>(&mut conn)
        })
        .await
        .map_err(|e| DomainError::RepositoryError(e.to_string()))?
        .map_err(|e| DomainError::RepositoryError(e.to_string()))?;

        Ok(result
            .into_iter()
            .map(|(file_hash, file_name, total_pieces)| FileSummary {
                file_hash,
                file_name,
                total_pieces,
            })
            .collect())
    }

    async fn record_announce(
        &self,
        ip: &str,
        port: u16,
        declarations: &[FileDeclaration],
    ) -> Result<(), DomainError> {
        let mut conn = self.conn()?;
        let ip = ip.to_string();
        let declarations = declarations.to_vec();

        let result = tokio::task::spawn_blocking(move || {
            conn.transaction::<(), TxError, _>(|conn| {
                let now = Utc::now().naive_utc();

                // Upsert on (ip, port): new peers get a row, returning
                // peers get a fresh last_active.
                diesel::insert_into(peers::table)
                    .values((
                        peers::ip.eq(&ip),
                        peers::port.eq(port as i32),
                        peers::last_active.eq(now),
                    ))
                    .on_conflict((peers::ip, peers::port))
                    .do_update()
                    .set(peers::last_active.eq(now))
                    .execute(conn)?;

                let peer_id = peers::table
                    .filter(peers::ip.eq(&ip))
                    .filter(peers::port.eq(port as i32))
                    .select(peers::id)
                    .first::<i32>(conn)?;

                for declaration in &declarations {
                    let file = files::table
                        .filter(files::file_hash.eq(&declaration.file_hash))
                        .select(FileModel::as_select())
                        .first::<FileModel>(conn)
                        .optional()?
                        .ok_or_else(|| {
                            TxError::Domain(DomainError::FileNotFoundByHash(
                                declaration.file_hash.clone(),
                            ))
                        })?;

                    for &piece_index in &declaration.pieces {
                        // Compare in i64: a u32 index above i32::MAX
                        // must not wrap past the bounds check.
                        if i64::from(piece_index) >= i64::from(file.total_pieces) {
                            return Err(TxError::Domain(DomainError::ValidationError(format!(
                                "Piece index {} out of range for file {} with {} pieces",
                                piece_index, file.file_hash, file.total_pieces
                            ))));
                        }
                        // Insert-or-ignore: concurrent announces of the
                        // same (file, peer, piece) must not conflict.
                        diesel::insert_or_ignore_into(file_pieces::table)
                            .values((
                                file_pieces::file_id.eq(file.id),
                                file_pieces::peer_id.eq(peer_id),
                                file_pieces::piece_index.eq(piece_index as i32),
                            ))
                            .execute(conn)?;
                    }
                }

                Ok(())
            })
        })
        .await
        .map_err(|e| DomainError::RepositoryError(e.to_string()))?;

        result.map_err(DomainError::from)
    }

    async fn piece_holders(&self, file_hash: &str) -> Result<FileHolders, DomainError> {
        let mut conn = self.conn()?;
        let file_hash = file_hash.to_string();

        let result = tokio::task::spawn_blocking(move || {
            conn.transaction::<FileHolders, TxError, _>(|conn| {
                let file = files::table
                    .filter(files::file_hash.eq(&file_hash))
                    .select(FileModel::as_select())
                    .first::<FileModel>(conn)
                    .optional()?
                    .ok_or_else(|| {
                        TxError::Domain(DomainError::FileNotFoundByHash(file_hash.clone()))
                    })?;

                let rows = file_pieces::table
                    .inner_join(peers::table)
                    .filter(file_pieces::file_id.eq(file.id))
                    .select((
                        file_pieces::piece_index,
                        peers::id,
                        peers::ip,
                        peers::port,
                        peers::last_active,
                    ))
                    .load::<HolderRow>(conn)?;

                let hashes = piece_hashes::table
                    .filter(piece_hashes::file_id.eq(file.id))
                    .select((piece_hashes::piece_index, piece_hashes::piece_hash))
                    .load::<(i32, String)>(conn)?;

                Ok(FileHolders {
                    file: file.into(),
                    holders: rows.into_iter().map(|row| row.into()).collect(),
                    piece_hashes: hashes
                        .into_iter()
                        .map(|(index, hash)| (index as u32, hash))
                        .collect::<HashMap<u32, String>>(),
                })
            })
        })
        .await
        .map_err(|e| DomainError::RepositoryError(e.to_string()))?;

        result.map_err(DomainError::from)
    }
}
