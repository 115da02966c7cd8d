//! Log output for the `todoq` binary.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber on stdout.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `level` and
/// everything else at `warn`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(level: Level) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()?;
    Ok(())
}

fn default_directives(level: Level) -> String {
    format!("warn,todoq={}", level.to_string().to_ascii_lowercase())
}
