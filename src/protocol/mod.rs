/*!
 * Wire protocol: request envelopes and the client that speaks them
 *
 * The server understands five request kinds on top of login/logout:
 *
 * - `POST /probefolder/<rel>` with a children listing
 * - `GET  /probefile/<rel>` answering the mirror's digest
 * - `POST /backup/<rel>` carrying a file (base64) or a folder marker
 * - `DELETE /backup/<rel>`
 *
 * Request bodies are JSON; the envelope types here are shared with the
 * server crate so both sides agree on field names.
 */

pub mod client;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use client::{Outcome, Remote, ServerClient};

/// Route prefixes of the server API
pub const API_PROBE_FILE: &str = "/probefile/";
pub const API_PROBE_FOLDER: &str = "/probefolder/";
pub const API_BACKUP: &str = "/backup/";
pub const API_LOGIN: &str = "/login";
pub const API_LOGOUT: &str = "/logout";

/// Body of `POST /login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /probefolder/<rel>`: the immediate children of the local
/// directory. Set semantics; order carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeFolderRequest {
    pub children: BTreeSet<String>,
}

/// Body of `POST /backup/<rel>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackupRequest {
    File { encodedfile: String },
    Folder,
}
