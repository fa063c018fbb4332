//! Diagnostic tracing for provisioning runs.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: provider requests and responses, poll decisions and
//!   error classification, written to stderr.
//! - **Progress (`progress`)**: the stdout markers a pipeline user reads. Always
//!   printed, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "warn,cfn_provision=debug";

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise defaults to `warn`, or to debug output for this
/// crate when `verbose` is on.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=cfn_provision=trace,aws_smithy_runtime=debug cfn-provision
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
