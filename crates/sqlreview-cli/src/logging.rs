//! Tracing initialisation for the binary.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding an `EnvFilter` directive list.
pub const LOG_ENV: &str = "SQLREVIEW_LOG";

/// Filter used when `SQLREVIEW_LOG` is unset or invalid.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "sqlreview_core=debug,sqlreview_cli=debug,warn",
        _ => "sqlreview_core=trace,sqlreview_cli=trace,info",
    }
}

/// Installs a stderr subscriber. Later calls are no-ops.
pub fn init(verbose: u8) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
