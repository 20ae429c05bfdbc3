//! NWScript Tools
//!
//! CLI drivers for the NWScript compiler.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default
/// filter. Default is `warn`, with `info` for the compiler crates.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,nwscript_compiler=info,nwscript_parser=info,nwscript_tools=info")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
