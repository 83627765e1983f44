//! Plex Media Server updater
//!
//! Checks the release manifest for a newer server build and installs it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use server_updater::{
    Channel, CommandInstaller, HttpClient, InstalledServerProbe, ReleaseCatalogClient,
    ReleaseTarget, Session, StatusLog, SystemProbe, UpdaterConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

/// Command-line arguments for the updater
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Update channel (public or beta) instead of the server setting
    #[arg(long)]
    channel: Option<Channel>,

    /// Release manifest URL
    #[arg(long)]
    catalog_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report installed and latest versions
    Check,
    /// Download, verify and install the latest release
    Update,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).init();

    let mut config = UpdaterConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(url) = args.catalog_url {
        config = config.catalog_url(url);
    }
    if let Some(channel) = args.channel {
        config = config.channel(channel);
    }

    let mut session = open_session(&config)?;

    let succeeded = match args.command {
        Commands::Check => {
            let report = session.check().await;
            println!("Installed version: {}", report.installed);
            println!("Latest version:    {}", report.latest);
            println!(
                "Update available:  {}",
                if report.update_available { "yes" } else { "no" }
            );
            true
        }
        Commands::Update => {
            let succeeded = session.update().await;
            for line in session.status().messages() {
                println!("{line}");
            }
            succeeded
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn open_session(config: &UpdaterConfig) -> anyhow::Result<Session<HttpClient, CommandInstaller>> {
    let probe = InstalledServerProbe::new(
        SystemProbe::new(config.probe.clone()),
        config.probe.clone(),
    );

    let mut client = HttpClient::builder().timeout(config.catalog.timeout());
    if let Some(agent) = &config.catalog.user_agent {
        client = client.user_agent(agent.clone());
    }
    let catalog = ReleaseCatalogClient::with_url(client.build()?, &config.catalog.url)
        .with_context(|| format!("invalid catalog url {}", config.catalog.url))?;
    let installer = CommandInstaller::new(config.install.command.clone())?;

    let session = Session::initialize(
        &probe,
        catalog,
        ReleaseTarget::from_config(&config.catalog),
        installer,
        StatusLog::new(),
    )?;

    let staging_dir = config.install.staging_dir.clone();
    let keep_staged = config.install.keep_staged;
    Ok(session.configure(|executor| {
        let executor = executor.keep_staged(keep_staged);
        match staging_dir {
            Some(dir) => executor.with_staging_dir(dir),
            None => executor,
        }
    }))
}
