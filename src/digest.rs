/*!
 * File digest and transport encoding
 *
 * The wire equivalence check is a SHA-256 over file bytes, compared as
 * lowercase hex. File content travels as standard base64 with padding.
 */

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

const CHUNK_SIZE: usize = 2048;

/// Compute the SHA-256 of a file's byte content, streaming in fixed-size
/// chunks. Returns 64 lowercase hex characters.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Base64-encode a file's entire content for transport.
///
/// The whole file is read into memory; the protocol assumes files small
/// enough for that. No line breaks are inserted.
pub fn encode_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(STANDARD.encode(bytes))
}
