use {
    anyhow::Result,
    chrono::Utc,
    clap::{Parser, Subcommand},
    keepsake_server::{Config, storage::Storage, util::default_config_path},
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
pub struct Cli {
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Delete expired pages now.
    Cleanup,
    /// List stored pages with their bookkeeping.
    List,
}

#[expect(clippy::print_stdout, reason = "command output")]
fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::parse(&config_path)?;
    let storage = Storage::new(config.storage_path)?;
    let now = Utc::now();
    match cli.command {
        Command::Cleanup => {
            let removed = storage.remove_expired(now)?;
            println!("Removed {removed} expired page(s).");
        }
        Command::List => {
            let sites = storage.list()?;
            if sites.is_empty() {
                println!("No stored pages.");
            }
            for site in sites {
                let state = if site.is_expired(now) {
                    "expired"
                } else if site.accepted_at.is_some() {
                    "accepted"
                } else {
                    "pending"
                };
                let expires_at = site
                    .expires_at
                    .map_or_else(|| "never".to_owned(), |at| at.to_rfc3339());
                println!(
                    "{}\t{}\tviews: {}\t{state}\texpires: {expires_at}",
                    site.id,
                    site.created_at.to_rfc3339(),
                    site.view_count,
                );
            }
        }
    }
    Ok(())
}
