/*!
 * Error types for Vigil
 */

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, VigilError>;

#[derive(Debug)]
pub enum VigilError {
    /// Hostname could not be resolved or the request could not be built
    Resolve(String),

    /// TCP connection to the server failed or timed out
    Connect(String),

    /// The request could not be written to the server
    Write(String),

    /// The response could not be read from the server
    Read(String),

    /// The server answered with a status other than 200 or 404
    Http { status: u16, body: String },

    /// Local I/O error
    Io(io::Error),

    /// Path outside the watched root, or otherwise unusable
    InvalidPath(std::path::PathBuf),

    /// Configuration error
    Config(String),

    /// The reconnection budget ran out
    RetriesExhausted { attempts: u32 },
}

impl VigilError {
    /// Check whether this is an HTTP-level failure (the server answered,
    /// but with an error status). The retry supervisor only decrements the
    /// reconnection budget for these; transport failures retry for free.
    pub fn is_http(&self) -> bool {
        matches!(self, VigilError::Http { .. })
    }

    /// Check whether this is a transport failure at any stage
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            VigilError::Resolve(_)
                | VigilError::Connect(_)
                | VigilError::Write(_)
                | VigilError::Read(_)
        )
    }
}

impl fmt::Display for VigilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VigilError::Resolve(msg) => write!(f, "resolve: {}", msg),
            VigilError::Connect(msg) => write!(f, "connect: {}", msg),
            VigilError::Write(msg) => write!(f, "write: {}", msg),
            VigilError::Read(msg) => write!(f, "read: {}", msg),
            VigilError::Http { status, body } => {
                if body.is_empty() {
                    write!(f, "server answered {}", status)
                } else {
                    write!(f, "server answered {}: {}", status, body)
                }
            }
            VigilError::Io(err) => write!(f, "I/O error: {}", err),
            VigilError::InvalidPath(path) => write!(f, "invalid path: {}", path.display()),
            VigilError::Config(msg) => write!(f, "configuration error: {}", msg),
            VigilError::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} reconnection attempts", attempts)
            }
        }
    }
}

impl std::error::Error for VigilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VigilError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for VigilError {
    fn from(err: io::Error) -> Self {
        VigilError::Io(err)
    }
}
