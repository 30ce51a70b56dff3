use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::Response;
use reqwest::header::{CONTENT_DISPOSITION, ETAG};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result, format_server_error};
use crate::search::HttpTransport;
use crate::util::{filename_from_disposition, online_url, product_url};
use crate::verify::{HashingReader, checksum_matches, normalize_etag};

/// A product file that was written and passed checksum verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedProduct {
    pub path: PathBuf,
    /// MD5 computed over the received bytes (lower-case hex).
    pub checksum: String,
    /// Checksum announced by the hub in the `ETag` header.
    pub expected_checksum: String,
    pub bytes: u64,
}

/// Result of a download request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Downloaded(DownloadedProduct),
    /// The product sits in the long-term archive. The hub has queued its
    /// retrieval; ask again later.
    ArchivePending { id: String },
}

impl TransferOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            TransferOutcome::Downloaded(p) => Some(&p.path),
            TransferOutcome::ArchivePending { .. } => None,
        }
    }

    pub fn is_archive_pending(&self) -> bool {
        matches!(self, TransferOutcome::ArchivePending { .. })
    }
}

/// Capability to fetch product files and check their availability.
pub trait ProductTransferEngine {
    /// Downloads product `id` into `dest_dir`, verifying its checksum.
    fn download(&self, id: &str, dest_dir: &Path) -> Result<TransferOutcome>;

    /// Whether the product is on the hub's online storage.
    fn is_online(&self, id: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct TransferEngine {
    transport: HttpTransport,
    base_url: String,
    progress: bool,
}

impl TransferEngine {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?, config))
    }

    pub fn with_transport(transport: HttpTransport, config: &ClientConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            progress: config.progress,
        }
    }

    fn write_verified(
        &self,
        resp: Response,
        mut out: File,
        path: &Path,
        expected: String,
        content_length: Option<u64>,
    ) -> Result<DownloadedProduct> {
        let pb = if self.progress {
            let pb = ProgressBar::new(content_length.unwrap_or(0));
            let style = ProgressStyle::with_template(
                "{prefix} {spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
            )
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            if let Some(name) = path.file_name() {
                pb.set_prefix(format!("[ {} ]", name.to_string_lossy()));
            }
            Some(pb)
        } else {
            None
        };

        let mut reader = HashingReader::new(resp);
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            out.write_all(&buf[..n])?;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }
        out.flush()?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        let received = reader.bytes_read();
        if let Some(expected_len) = content_length {
            if received != expected_len {
                return Err(Error::Truncated {
                    path: path.to_path_buf(),
                    expected: expected_len,
                    received,
                });
            }
        }

        let actual = reader.finish();
        if !checksum_matches(&expected, &actual) {
            warn!(file = %path.display(), %expected, %actual, "checksum mismatch");
            return Err(Error::ChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }

        Ok(DownloadedProduct {
            path: path.to_path_buf(),
            checksum: actual,
            expected_checksum: expected,
            bytes: received,
        })
    }
}

/// Unverified bytes go to `<name>.part` next to the final file and are
/// renamed over it only once length and checksum match.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

impl ProductTransferEngine for TransferEngine {
    fn download(&self, id: &str, dest_dir: &Path) -> Result<TransferOutcome> {
        let url = product_url(&self.base_url, id);
        let resp = self.transport.send(&url)?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::ACCEPTED => {
                info!(id, "product is archived, offline retrieval triggered");
                return Ok(TransferOutcome::ArchivePending { id: id.to_string() });
            }
            status => {
                let body = resp.text().unwrap_or_default();
                return Err(format_server_error(status, &url, &body));
            }
        }

        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .ok_or(Error::MissingHeader("Content-Disposition"))?;
        let expected = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(normalize_etag)
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingHeader("ETag"))?;
        let content_length = resp.content_length();

        if !dest_dir.as_os_str().is_empty() {
            fs::create_dir_all(dest_dir)?;
        }
        let path = dest_dir.join(&filename);
        let staging = staging_path(&path);
        info!(id, file = %path.display(), bytes = content_length, "downloading product");

        let out = File::create(&staging)?;
        let verified = self
            .write_verified(resp, out, &path, expected, content_length)
            .and_then(|product| {
                fs::rename(&staging, &product.path)?;
                Ok(product)
            });
        match verified {
            Ok(product) => {
                info!(id, file = %product.path.display(), bytes = product.bytes, "download verified");
                Ok(TransferOutcome::Downloaded(product))
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&staging) {
                    if rm.kind() != ErrorKind::NotFound {
                        warn!(file = %staging.display(), error = %rm, "failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    fn is_online(&self, id: &str) -> Result<bool> {
        let url = online_url(&self.base_url, id);
        let resp = self.transport.send(&url)?;
        let status = resp.status();
        let body = resp.bytes()?;
        if !status.is_success() {
            return Err(format_server_error(
                status,
                &url,
                &String::from_utf8_lossy(&body),
            ));
        }
        Ok(&body[..] == b"true")
    }
}
