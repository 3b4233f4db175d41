//! detriot - master, node and proxy roles of the detriot service.
//!
//! Roles talk to each other over lrpc. Each one reads its settings from a JSON
//! config file (see [`config`]).

mod config;
mod master;
mod peer;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lrpc::log::fatal;
use lrpc::LogConfig;
use tracing::{error, info};

use crate::config::{Role, RoleConfig};

#[derive(Parser, Debug)]
#[command(name = "detriot")]
#[command(about = "detriot server")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the master
    Master(RoleArgs),
    /// Run a node
    Node(RoleArgs),
    /// Run a proxy
    Proxy(RoleArgs),
    /// Print the version
    Version,
}

#[derive(clap::Args, Debug)]
struct RoleArgs {
    /// Config file path (defaults to conf/<role>.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command {
        Command::Version => {
            println!("detriot {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Master(role_args) => {
            let config = load_role(Role::Master, &role_args, args.debug);
            match master::run(&config, shutdown_signal()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Run master error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Node(role_args) => {
            let config = load_role(Role::Node, &role_args, args.debug);
            run_peer(Role::Node, &config)
        }
        Command::Proxy(role_args) => {
            let config = load_role(Role::Proxy, &role_args, args.debug);
            run_peer(Role::Proxy, &config)
        }
    }
}

fn run_peer(role: Role, config: &RoleConfig) -> ExitCode {
    match peer::run(role, config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run {} error: {}", role.name(), e);
            ExitCode::FAILURE
        }
    }
}

/// Load the role's config and install the logger it describes.
///
/// Exits the process if either step fails.
fn load_role(role: Role, args: &RoleArgs, debug: bool) -> RoleConfig {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| role.default_config_path());

    let loaded = if role.requires_config() {
        RoleConfig::load(&path).map(Some)
    } else {
        RoleConfig::load_optional(&path)
    };

    let mut config = match loaded {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            let _ = LogConfig::default().init();
            fatal(e);
        }
    };
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }

    let log_config = match config.log_config(debug) {
        Ok(log_config) => log_config,
        Err(e) => {
            let _ = LogConfig::default().init();
            fatal(e);
        }
    };
    if let Err(e) = log_config.init() {
        eprintln!("{}", e);
    }

    info!("Starting detriot {}", role.name());
    info!("config path: {}", path.display());
    config
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        return std::future::pending().await;
    }
    info!("Shutdown signal received, exiting");
}
