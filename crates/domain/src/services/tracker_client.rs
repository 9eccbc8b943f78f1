use crate::entities::{FileDeclaration, FileMeta, FileSummary, RegisteredFile, Swarm};
use crate::errors::DomainError;
use crate::services::download_service::SwarmProvider;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Serialize)]
struct AnnounceRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
    port: u16,
    files: &'a [FileDeclaration],
}

#[derive(Debug, Serialize)]
struct RegisterFileRequest<'a> {
    file_name: &'a str,
    file_hash: &'a str,
    piece_length: i32,
    total_pieces: i32,
    piece_hashes: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the tracker's announce/registry surface.
pub struct HttpTrackerClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTrackerClient {
    pub fn new(base_url: &str) -> Result<Self, DomainError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DomainError::ValidationError(format!("Invalid tracker URL: {}", e)))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DomainError> {
        self.base_url
            .join(path)
            .map_err(|e| DomainError::ValidationError(format!("Invalid tracker URL: {}", e)))
    }

    pub async fn register_file(
        &self,
        file: &FileMeta,
        piece_hashes: &[String],
    ) -> Result<RegisteredFile, DomainError> {
        let response = self
            .http
            .post(self.endpoint("/files")?)
            .json(&RegisterFileRequest {
                file_name: &file.file_name,
                file_hash: &file.file_hash,
                piece_length: file.piece_length,
                total_pieces: file.total_pieces,
                piece_hashes,
            })
            .send()
            .await
            .map_err(transport)?;

        let created = response.status() == StatusCode::CREATED;
        let response = check(response).await?;
        let file: FileMeta = response.json().await.map_err(transport)?;
        Ok(RegisteredFile { file, created })
    }

    pub async fn announce(
        &self,
        ip: Option<&str>,
        port: u16,
        files: &[FileDeclaration],
    ) -> Result<(), DomainError> {
        let response = self
            .http
            .post(self.endpoint("/announce")?)
            .json(&AnnounceRequest { ip, port, files })
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    pub async fn upload(&self, port: u16, files: &[FileDeclaration]) -> Result<(), DomainError> {
        let response = self
            .http
            .post(self.endpoint("/upload")?)
            .json(&AnnounceRequest {
                ip: None,
                port,
                files,
            })
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<FileSummary>, DomainError> {
        let response = self
            .http
            .get(self.endpoint("/files")?)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response).await?;
        response.json().await.map_err(transport)
    }

    pub async fn peers_for_file(&self, file_hash: &str) -> Result<Swarm, DomainError> {
        let response = self
            .http
            .get(self.endpoint("/peers")?)
            .query(&[("file_hash", file_hash)])
            .send()
            .await
            .map_err(transport)?;
        let response = check(response).await?;
        response.json().await.map_err(transport)
    }
}

#[async_trait]
impl SwarmProvider for HttpTrackerClient {
    async fn swarm_for_file(&self, file_hash: &str) -> Result<Swarm, DomainError> {
        self.peers_for_file(file_hash).await
    }
}

fn transport(e: reqwest::Error) -> DomainError {
    DomainError::TransportError(e.to_string())
}

/// Map the tracker's structured error bodies back onto the domain
/// taxonomy the service raised them from.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("tracker returned {}", status));

    Err(match status {
        StatusCode::NOT_FOUND => DomainError::NotFound(reason),
        StatusCode::BAD_REQUEST => DomainError::ValidationError(reason),
        _ => DomainError::TransportError(reason),
    })
}
