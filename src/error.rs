use reqwest::StatusCode;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Search criteria rejected before any request was issued.
    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    /// Request construction or transport failure (bad URL, connection, timeout).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with a status the client cannot act on.
    #[error("{message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// A continuation page kept failing after every retry.
    #[error("result page at offset {offset} still failing after {attempts} attempt(s) (last HTTP {status})")]
    RetriesExhausted {
        offset: usize,
        attempts: usize,
        status: u16,
    },

    /// The hub declared more results than it was willing to serve.
    #[error("hub declared {declared} result(s) but stopped serving after {received}")]
    IncompleteResults { declared: usize, received: usize },

    #[error("malformed search response: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),

    /// Downloaded bytes do not hash to the ETag the hub supplied.
    #[error("integrity error: checksum mismatch for {} (expected {expected}, computed {actual})", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The body ended before `Content-Length` bytes arrived.
    #[error("download of {} truncated: received {received} of {expected} byte(s)", path.display())]
    Truncated {
        path: PathBuf,
        expected: u64,
        received: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether repeating the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Status { status, .. } => {
                matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            Error::RetriesExhausted { .. } | Error::Truncated { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } | Error::RetriesExhausted { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub(crate) fn format_server_error(status: StatusCode, url: &str, body: &str) -> Error {
    let server_message = body.trim();

    let message = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        format!(
            "hub authentication/authorization failed (HTTP {}).\n- Check the user name and password passed to the client\n- New accounts may need a few minutes before the API accepts them\n\nServer message: {}\nrequest: {}",
            status.as_u16(),
            server_message,
            url
        )
    } else if status == StatusCode::NOT_FOUND {
        format!(
            "hub resource not found (HTTP 404).\n- The product identifier may be wrong or the product was removed\n- Check the configured base URL, e.g. https://scihub.copernicus.eu/dhus\n\nServer message: {}\nrequest: {}",
            server_message, url
        )
    } else {
        format!(
            "hub request failed: HTTP {} for url ({})\n{}",
            status.as_u16(),
            url,
            server_message
        )
    };

    Error::Status {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    }
}
