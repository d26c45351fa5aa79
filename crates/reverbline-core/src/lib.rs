//! Reverbline Core - shared infrastructure for the reverb dataset pipeline
//!
//! Blocking HTTP downloads on a shared runtime, retry with backoff,
//! logging and progress reporting, graceful shutdown, and the work queue
//! used by the acquisition and convolution stages.

pub mod fetch;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod tmp;
pub mod work_queue;

// Re-exports for convenience
pub use fetch::{
    HttpConfig, StreamError, download_to_file, http_config, part_path, set_http_config,
};
pub use logging::{ProgressLogger, Verbosity, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{Retryable, retry_with_backoff};
pub use shutdown::{install_signal_handlers, is_shutdown_requested};
pub use tmp::cleanup_stale_files;
pub use work_queue::WorkQueue;
