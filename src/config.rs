use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::util::strip_quotes;

pub const DEFAULT_BASE_URL: &str = "https://scihub.copernicus.eu/dhus";

/// Largest page the hub serves. Larger `rows` values are silently capped
/// server side, which leaves gaps between pages.
pub const MAX_ROWS: usize = 100;

/// Everything a client needs, fixed at construction time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub root, typically `https://scihub.copernicus.eu/dhus`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Page size (`rows`) for catalog searches.
    pub rows: usize,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Retries allowed for one failing continuation page.
    pub retry_max: usize,
    /// First backoff delay; doubles on every retry.
    pub retry_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub sleep_max: Duration,
    /// Draw a progress bar while downloading.
    pub progress: bool,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: username.into(),
            password: password.into(),
            rows: MAX_ROWS,
            timeout: Duration::from_secs(60),
            retry_max: 5,
            retry_delay: Duration::from_secs(1),
            sleep_max: Duration::from_secs(60),
            progress: true,
            verify: true,
        }
    }

    /// Loads credentials using (in order of precedence):
    /// - environment variables `SCIHUB_URL` / `SCIHUB_CREDENTIALS` (`user:password`)
    /// - config file from `SCIHUB_RC` or `.scihubrc`
    ///
    /// Only called on demand; the client itself never reads the environment.
    pub fn from_env() -> Result<Self> {
        load_config(None, None, None)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Page size for searches. Keep it at or below [`MAX_ROWS`]: the offset
    /// advances by `rows` while the hub returns at most [`MAX_ROWS`] records,
    /// so a larger value skips records and ends in
    /// [`Error::IncompleteResults`].
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_max(mut self, retry_max: usize) -> Self {
        self.retry_max = retry_max;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_sleep_max(mut self, sleep_max: Duration) -> Self {
        self.sleep_max = sleep_max;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.rows == 0 {
            return Err(Error::Config("rows must be at least 1".into()));
        }
        if self.rows > MAX_ROWS {
            warn!(
                rows = self.rows,
                max = MAX_ROWS,
                "page size exceeds the hub limit; records between pages will be missed"
            );
        }
        if self.username.is_empty() {
            return Err(Error::Config("missing user name".into()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base url {}: {}", self.base_url, e)))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    verify: Option<bool>,
}

pub(crate) fn load_config(
    url: Option<String>,
    credentials: Option<(String, String)>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("SCIHUB_URL").ok());
    let mut credentials = credentials.or_else(|| {
        std::env::var("SCIHUB_CREDENTIALS")
            .ok()
            .and_then(|c| split_credentials(&c))
    });

    let rc_candidates = rc_candidates();
    let mut file_verify: Option<bool> = None;

    if url.is_none() || credentials.is_none() || verify.is_none() {
        for rc_path in &rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).map_err(|e| {
                    Error::Config(format!(
                        "failed to read configuration file {}: {}",
                        rc_path.display(),
                        e
                    ))
                })?;

                if url.is_none() {
                    url = cfg.url;
                }
                if credentials.is_none() {
                    if let (Some(u), Some(p)) = (cfg.user, cfg.password) {
                        credentials = Some((u, p));
                    }
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    let (user, password) = credentials.ok_or_else(|| {
        let places = rc_candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Error::Config(if places.is_empty() {
            "missing credentials (set SCIHUB_CREDENTIALS=user:password or create .scihubrc)"
                .to_string()
        } else {
            format!(
                "missing credentials (set SCIHUB_CREDENTIALS=user:password or put `user:`/`password:` in one of: {})",
                places
            )
        })
    })?;

    let mut cfg = ClientConfig::new(user, password)
        .with_verify(verify.or(file_verify).unwrap_or(true));
    if let Some(url) = url {
        cfg = cfg.with_base_url(url);
    }
    Ok(cfg)
}

fn split_credentials(raw: &str) -> Option<(String, String)> {
    let (user, password) = raw.split_once(':')?;
    let user = user.trim();
    if user.is_empty() || password.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}

fn read_rc(path: &Path) -> std::io::Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((k, v)) = line.split_once(':') {
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                continue;
            }
            match k.trim() {
                "url" => cfg.url = Some(v.to_string()),
                "user" => cfg.user = Some(v.to_string()),
                "password" => cfg.password = Some(v.to_string()),
                "verify" => cfg.verify = Some(v != "0"),
                _ => {}
            }
        }
    }

    cfg
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) SCIHUB_RC (explicit)
    // 2) ./.scihubrc
    // 3) ~/.scihubrc
    if let Ok(p) = std::env::var("SCIHUB_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".scihubrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".scihubrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_file_with_urls_and_quotes() {
        let cfg = parse_rc(
            "# hub settings\nurl: https://apihub.copernicus.eu/apihub\nuser: 'alice'\npassword: \"s3:cr3t\"\nverify: 0\n",
        );
        assert_eq!(cfg.url.as_deref(), Some("https://apihub.copernicus.eu/apihub"));
        assert_eq!(cfg.user.as_deref(), Some("alice"));
        assert_eq!(cfg.password.as_deref(), Some("s3:cr3t"));
        assert_eq!(cfg.verify, Some(false));
    }

    #[test]
    fn credentials_split_on_first_colon() {
        assert_eq!(
            split_credentials("bob:pa:ss"),
            Some(("bob".to_string(), "pa:ss".to_string()))
        );
        assert_eq!(split_credentials("nocolon"), None);
        assert_eq!(split_credentials(":pw"), None);
    }

    #[test]
    fn explicit_values_win() {
        let cfg = load_config(
            Some("http://localhost:8080/dhus".into()),
            Some(("u".into(), "p".into())),
            Some(false),
        )
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8080/dhus");
        assert_eq!(cfg.username, "u");
        assert!(!cfg.verify);
        assert_eq!(cfg.rows, 100);
    }

    #[test]
    fn default_page_size_is_the_hub_limit() {
        let cfg = ClientConfig::new("u", "p");
        assert_eq!(cfg.rows, MAX_ROWS);
        assert!(cfg.validate().is_ok());
        // Oversized pages only warn; the hub decides what it serves.
        assert!(cfg.with_rows(MAX_ROWS + 1).validate().is_ok());
    }

    #[test]
    fn validation_rejects_zero_rows() {
        let cfg = ClientConfig::new("u", "p").with_rows(0);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        assert!(ClientConfig::new("u", "p").validate().is_ok());
        assert!(ClientConfig::new("u", "p").with_base_url("not a url").validate().is_err());
    }
}
