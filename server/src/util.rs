use {
    anyhow::{Context as _, Result},
    std::path::PathBuf,
    tracing_subscriber::{EnvFilter, prelude::*},
};

pub const CONFIG_FILE_NAME: &str = "keepsake-server.json5";

/// `/etc/keepsake` on Linux, `keepsake` under the platform config dir elsewhere.
pub fn default_config_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "linux") {
        Some(PathBuf::from("/etc"))
    } else {
        dirs::config_dir()
    };
    Ok(base.context("no config directory on this platform")?.join("keepsake"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Logs to stderr. `RUST_LOG` overrides `log_filter` when set.
pub fn setup_logger(log_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_filter)?,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;
    Ok(())
}
