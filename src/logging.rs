use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging on stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info for
/// this crate. Report data never goes through the logger.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "unclaimed_rights=debug"
    } else {
        "unclaimed_rights=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // Ignore the error if a subscriber is already installed (tests, embedding).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
