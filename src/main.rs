use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use firelet::config::{RunnerConfig, SessionBackendKind};
use firelet::session::{LiveBackend, MockBackend, SessionBackend};
use firelet::{loader, HostStatus, Orchestrator, Result};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "firelet")]
#[command(about = "Distributed firewall management controller")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the RunnerConfig TOML file
    #[arg(short, long, default_value = "firelet.toml")]
    config: PathBuf,

    /// Directory holding the rules/hosts/hostgroups/services/networks tables
    #[arg(short, long, default_value = "./firewall")]
    repo: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the loaded tables into flat packet-filter directives
    Compile,
    /// Compile and slice the directives per host and interface
    Slice,
    /// Compile, slice, and deploy to every management host
    Deploy,
}

fn backend_for(config: &RunnerConfig) -> Arc<dyn SessionBackend> {
    match config.backend {
        SessionBackendKind::Live => {
            Arc::new(LiveBackend::new(Duration::from_secs(config.op_timeout_secs)))
        }
        SessionBackendKind::Mock => Arc::new(MockBackend::new(config.fixtures_dir())),
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = if cli.config.exists() {
        RunnerConfig::load(&cli.config)?
    } else {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
        RunnerConfig::default()
    };

    let fireset = loader::load_fireset(&cli.repo)?;

    match cli.command {
        Commands::Compile => {
            let directives = firelet::compile(&fireset)?;
            for directive in &directives {
                println!("{directive}");
            }
            Ok(true)
        }
        Commands::Slice => {
            let sliced = firelet::compile_per_host(&fireset)?;
            for (host, ifaces) in &sliced {
                for (iface, directives) in ifaces {
                    println!("# {host}:{iface}");
                    for directive in directives {
                        println!("{directive}");
                    }
                }
            }
            Ok(true)
        }
        Commands::Deploy => {
            let backend = backend_for(&config);
            let orchestrator = Orchestrator::new(
                backend,
                config.remote_user.clone(),
                Duration::from_secs(config.op_timeout_secs),
                Duration::from_secs(config.step_deadline_secs),
            );
            let statuses = orchestrator.deploy(&fireset).await?;

            let mut all_ok = true;
            for (host, status) in &statuses {
                match status {
                    HostStatus::Ok => println!("{host}: ok"),
                    HostStatus::Error(e) => {
                        all_ok = false;
                        println!("{host}: failed ({e})");
                    }
                }
            }
            Ok(all_ok)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "firelet=debug" } else { "firelet=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    info!(repo = %cli.repo.display(), "starting");

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
