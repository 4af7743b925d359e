pub mod cli;
pub mod config;

use {
    crate::{
        cli::{Cli, Command},
        config::Config,
    },
    anyhow::{Context as _, Result, bail},
    keepsake_sdk::{
        client::Client,
        link::ShareableLink,
        orchestrator::{Acceptance, Orchestrator, Phase, Retrieval, RetrieveOptions},
        record::PlaintextRecord,
    },
    serde_json::json,
    std::path::Path,
    tracing::{debug, warn},
    tracing_subscriber::{EnvFilter, prelude::*},
};

/// Logs to stderr so that stdout only carries command output.
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

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let server_url = config.server_url(cli.server_url.as_ref())?;
    let orchestrator = Orchestrator::new(Client::new(server_url)?);
    match cli.command {
        Command::Create { record } => create(&orchestrator, &record).await,
        Command::Open { link, preview } => open(&orchestrator, &link, preview).await,
        Command::Accept { link } => {
            accept(&orchestrator, &link).await;
            Ok(())
        }
    }
}

pub fn read_record(path: &Path) -> Result<PlaintextRecord> {
    json5::from_str(&fs_err::read_to_string(path)?)
        .with_context(|| format!("invalid record file {}", path.display()))
}

#[expect(clippy::print_stdout, reason = "command output")]
async fn create(orchestrator: &Orchestrator, path: &Path) -> Result<()> {
    let record = read_record(path)?;
    let link = orchestrator.create(&record).await?;
    println!("{}", link.to_unmasked_string());
    Ok(())
}

#[expect(clippy::print_stdout, reason = "command output")]
async fn open(orchestrator: &Orchestrator, link: &ShareableLink, preview: bool) -> Result<()> {
    let on_phase = |phase: Phase| debug!(?phase, "retrieving");
    let retrieval = orchestrator
        .retrieve_with(link, RetrieveOptions { preview }, on_phase)
        .await;
    match retrieval {
        Retrieval::Displaying(opened) => {
            let output = json!({
                "id": opened.id,
                "view_count": opened.view_count,
                "accepted": opened.accepted,
                "record": opened.record,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Retrieval::Expired => bail!("this page has expired"),
        Retrieval::NotFound => bail!("page not found, or the link is incomplete"),
        Retrieval::NoKey => {
            bail!("the link has no key; copy the whole link including the part after `#`")
        }
    }
}

#[expect(clippy::print_stdout, reason = "command output")]
async fn accept(orchestrator: &Orchestrator, link: &ShareableLink) {
    match orchestrator.accept(link.id()).await {
        Acceptance::Confirmed => println!("Accepted."),
        Acceptance::Unconfirmed(err) => {
            warn!(%err, "the server did not confirm acceptance");
            println!("Accepted locally; the server did not confirm.");
        }
    }
}
