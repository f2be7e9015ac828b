//! Blocking HTTP client for the backup protocol.
//!
//! Every call resolves to one of three things: the entry is present
//! (`Outcome::Found`), the entry is absent (`Outcome::Missing`), or the
//! call failed (`Err`). 404 is never an error here; it is the signal that
//! drives creation.

use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::digest;
use crate::error::{Result, VigilError};
use crate::paths::RelPath;
use crate::protocol::{
    BackupRequest, LoginRequest, ProbeFolderRequest, API_BACKUP, API_LOGIN, API_LOGOUT,
    API_PROBE_FILE, API_PROBE_FOLDER,
};

/// Per-stage deadline: connect, and the whole write/read of a request
const DEADLINE: Duration = Duration::from_secs(60);

/// Result of a probe: the server has the entry, or it does not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    Missing,
}

/// The five tree operations the reconciliation engine needs from the
/// server. `ServerClient` is the wire implementation; tests substitute an
/// in-memory fake.
pub trait Remote {
    fn probe_folder(&self, abs: &Path) -> Result<Outcome>;
    fn probe_file(&self, abs: &Path) -> Result<Outcome>;
    fn backup_file(&self, abs: &Path) -> Result<()>;
    fn backup_folder(&self, abs: &Path) -> Result<()>;
    fn delete_path(&self, abs: &Path) -> Result<()>;
}

/// Authenticated protocol client
pub struct ServerClient {
    http: Client,
    base_url: String,
    root: PathBuf,
    user_agent: String,
    token: Option<String>,
}

impl ServerClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(DEADLINE)
            .timeout(DEADLINE)
            .build()
            .map_err(|e| VigilError::Resolve(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            root: config.backup_path.clone(),
            user_agent: format!("vigil/{}", crate::VERSION),
            token: None,
        })
    }

    /// Authenticate and store the returned token for all later calls.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self.send(
            Method::POST,
            API_LOGIN,
            Some(serde_json::to_string(&body).map_err(|e| VigilError::Write(e.to_string()))?),
        )?;

        let status = response.status();
        let text = read_body(response)?;
        if status == StatusCode::OK {
            tracing::info!("logged in as {}", username);
            self.token = Some(text);
            Ok(())
        } else {
            Err(VigilError::Http {
                status: status.as_u16(),
                body: text,
            })
        }
    }

    /// Invalidate the session server-side and drop the stored token.
    pub fn logout(&mut self) -> Result<()> {
        let response = self.send(Method::POST, API_LOGOUT, None)?;
        let status = response.status();
        if status == StatusCode::OK {
            self.token = None;
            Ok(())
        } else {
            Err(VigilError::Http {
                status: status.as_u16(),
                body: read_body(response)?,
            })
        }
    }

    fn target_for(&self, prefix: &str, abs: &Path) -> Result<String> {
        let rel = RelPath::new(&self.root, abs)?;
        Ok(format!("{}{}", prefix, rel.encode()))
    }

    fn send(&self, method: Method, target: &str, json_body: Option<String>) -> Result<Response> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, target))
            .header(USER_AGENT, &self.user_agent);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = json_body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body);
        }

        request.send().map_err(map_transport_error)
    }

    /// Map a response to the call outcome: 200 is found, 404 is missing,
    /// anything else is an HTTP failure carrying status and body.
    fn outcome(&self, response: Response) -> Result<Outcome> {
        match response.status() {
            StatusCode::OK => Ok(Outcome::Found),
            StatusCode::NOT_FOUND => Ok(Outcome::Missing),
            status => Err(VigilError::Http {
                status: status.as_u16(),
                body: read_body(response)?,
            }),
        }
    }
}

impl Remote for ServerClient {
    fn probe_folder(&self, abs: &Path) -> Result<Outcome> {
        let target = self.target_for(API_PROBE_FOLDER, abs)?;
        let children = children_of(abs)?;
        let body = serde_json::to_string(&ProbeFolderRequest { children })
            .map_err(|e| VigilError::Write(e.to_string()))?;

        let response = self.send(Method::POST, &target, Some(body))?;
        self.outcome(response)
    }

    fn probe_file(&self, abs: &Path) -> Result<Outcome> {
        let target = self.target_for(API_PROBE_FILE, abs)?;

        // Overlap the local digest with the network round-trip.
        let (local, response) = std::thread::scope(|s| {
            let digest_thread = s.spawn(|| digest::file_sha256(abs));
            let response = self.send(Method::GET, &target, None);
            let local = digest_thread
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (local, response)
        });

        let response = response?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Outcome::Missing),
            StatusCode::OK => {
                let remote = read_body(response)?;
                if remote == local? {
                    Ok(Outcome::Found)
                } else {
                    // The mirror holds stale content: replace it, then the
                    // re-probe must come back clean.
                    tracing::debug!("digest mismatch for {}, re-uploading", abs.display());
                    self.delete_path(abs)?;
                    self.backup_file(abs)?;
                    self.probe_file(abs)
                }
            }
            status => Err(VigilError::Http {
                status: status.as_u16(),
                body: read_body(response)?,
            }),
        }
    }

    fn backup_file(&self, abs: &Path) -> Result<()> {
        let target = self.target_for(API_BACKUP, abs)?;
        let body = BackupRequest::File {
            encodedfile: digest::encode_file(abs)?,
        };
        let body = serde_json::to_string(&body).map_err(|e| VigilError::Write(e.to_string()))?;

        let response = self.send(Method::POST, &target, Some(body))?;
        self.outcome(response).map(|_| ())
    }

    fn backup_folder(&self, abs: &Path) -> Result<()> {
        let target = self.target_for(API_BACKUP, abs)?;
        let body = serde_json::to_string(&BackupRequest::Folder)
            .map_err(|e| VigilError::Write(e.to_string()))?;

        let response = self.send(Method::POST, &target, Some(body))?;
        self.outcome(response).map(|_| ())
    }

    fn delete_path(&self, abs: &Path) -> Result<()> {
        let target = self.target_for(API_BACKUP, abs)?;
        let response = self.send(Method::DELETE, &target, None)?;
        // 404 just means the entry was already gone
        self.outcome(response).map(|_| ())
    }
}

/// Names of the immediate children of a local directory
fn children_of(dir: &Path) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        set.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(set)
}

fn read_body(response: Response) -> Result<String> {
    response.text().map_err(|e| VigilError::Read(e.to_string()))
}

fn map_transport_error(err: reqwest::Error) -> VigilError {
    if err.is_builder() {
        VigilError::Resolve(err.to_string())
    } else if err.is_connect() {
        VigilError::Connect(err.to_string())
    } else if err.is_timeout() {
        VigilError::Read(err.to_string())
    } else {
        VigilError::Write(err.to_string())
    }
}
