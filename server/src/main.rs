use {
    anyhow::Result,
    clap::Parser,
    keepsake_server::{
        Config,
        signal,
        util::{default_config_path, setup_logger},
    },
    std::path::PathBuf,
    tracing::info,
};

/// Storage service for sealed keepsake pages.
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Path to the JSON5 config file.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::parse(&config_path)?;
    setup_logger(&config.log_filter)?;
    info!(config = %config_path.display(), "starting server");

    keepsake_server::run(config, signal::shutdown()).await
}
