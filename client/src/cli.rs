use {
    clap::{Parser, Subcommand},
    keepsake_sdk::link::ShareableLink,
    std::path::PathBuf,
    url::Url,
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Path to the JSON5 config file.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// API root of the storage server. Overrides `server_url` from the config.
    #[clap(long)]
    pub server_url: Option<Url>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encrypt a record file and print the shareable link.
    Create {
        /// JSON5 file with the page content.
        record: PathBuf,
    },
    /// Download and decrypt the page behind a link.
    Open {
        link: ShareableLink,
        /// Do not count this as a view.
        #[arg(long)]
        preview: bool,
    },
    /// Tell the server the page was accepted.
    Accept { link: ShareableLink },
}
