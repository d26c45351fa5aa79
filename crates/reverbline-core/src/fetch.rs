//! HTTP download into local files with stall detection.
//!
//! Uses async reqwest on a shared tokio runtime, but presents a blocking
//! interface so rayon workers can call it directly.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

use futures_util::StreamExt;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide HTTP behaviour, set once from settings and CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// No data for this long = stall
    pub read_timeout: Duration,
    /// Extra attempts after a retryable failure. 0 = rerun the pipeline instead.
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            max_retries: 0,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the global HTTP config. Only the first call wins.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::warn!("HTTP config already initialized, ignoring {config:?}");
    }
}

/// Current HTTP config (defaults if never set).
pub fn http_config() -> HttpConfig {
    HTTP_CONFIG.get().copied().unwrap_or_default()
}

/// Error types for download operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error (local file or stalled body)
    Io(io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Http { .. } => None,
        }
    }
}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Client errors are permanent (a missing archive stays missing),
            // except request timeout and rate limiting.
            Self::Http {
                status: Some(s), ..
            } => !(400..500).contains(s) || matches!(s, 408 | 429),
            Self::Http { status: None, .. } => true,
            Self::Io(e) => e.kind() != io::ErrorKind::StorageFull,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// `<dest>.part`: where an in-flight download is written.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// HTTP GET `url` into `dest`.
///
/// The body streams into `<dest>.part`, which is renamed to `dest` only after
/// the whole body arrived. A failed download removes the part file, so `dest`
/// existing always means a complete download.
///
/// `on_progress(bytes_so_far, total)` is called after every chunk.
/// Returns the number of bytes written.
pub fn download_to_file(
    url: &str,
    dest: &Path,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<u64, StreamError> {
    let part = part_path(dest);
    let read_timeout = http_config().read_timeout;

    let result = SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StreamError::from_reqwest(&e))?;

        let total = response.content_length();
        on_progress(0, total);

        let mut file = File::create(&part)?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::time::timeout(read_timeout, body.next())
                .await
                .map_err(|_| {
                    StreamError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("read timeout ({}s with no data)", read_timeout.as_secs()),
                    ))
                })?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| StreamError::from_reqwest(&e))?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
            on_progress(written, total);
        }

        if let Some(expected) = total {
            if written != expected {
                return Err(StreamError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("body truncated: {written} of {expected} bytes"),
                )));
            }
        }

        file.sync_all()?;
        Ok::<_, StreamError>(written)
    });

    match result {
        Ok(bytes) => {
            fs::rename(&part, dest)?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}
