//! # FabricX CLI Entry Point
//!
//! Thin shell over the service crate: parses arguments, initializes
//! tracing and runs the HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the orchestration API on the default address
//! fabricx serve
//!
//! # Custom bind address and working directory
//! fabricx serve -b 0.0.0.0:8080 --base-dir /var/lib/fabricx
//! ```
//!
//! Log verbosity follows `RUST_LOG`; the default level is `info`.

use anyhow::Result;
use argh::FromArgs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fabricx_common::exec::SystemExecutor;
use fabricx_service::{FabricxService, HttpServer, NetworkRegistry, ServiceConfig, ServiceRouter};

#[derive(FromArgs)]
/// FabricX - local orchestration for multi-org ledger networks
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
}

/// Arguments for running the orchestration service.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the FabricX orchestration API
struct ServeArgs {
    /// address to bind the HTTP server to
    ///
    /// Defaults to "127.0.0.1:8080"; the service drives a local container
    /// runtime, so exposing it beyond localhost is rarely wanted.
    #[argh(option, short = 'b', default = "\"127.0.0.1:8080\".into()")]
    bind: String,

    /// directory under which per-network subtrees are created
    ///
    /// Defaults to a "fabricx" directory under the system temp dir. The
    /// layout is regenerated per network and not meant to survive restarts.
    #[argh(option, long = "base-dir")]
    base_dir: Option<PathBuf>,

    /// toolchain container image for crypto and channel generation
    #[argh(option, long = "tools-image")]
    tools_image: Option<String>,

    /// overall deadline in seconds for post-start readiness polling
    ///
    /// A network whose containers are not all live within this window
    /// fails bootstrap with a timeout. Defaults to 60.
    #[argh(option, long = "readiness-timeout-secs", default = "60")]
    readiness_timeout_secs: u64,

    /// wait in seconds after each channel join for gossip propagation
    ///
    /// Defaults to 2. The wait is heuristic, not event-driven.
    #[argh(option, long = "join-wait-secs", default = "2")]
    join_wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default log level INFO, overridable via RUST_LOG.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    let mut config = ServiceConfig {
        readiness_deadline: Duration::from_secs(args.readiness_timeout_secs),
        join_wait: Duration::from_secs(args.join_wait_secs),
        ..Default::default()
    };
    if let Some(base_dir) = args.base_dir {
        config.base_dir = base_dir;
    }
    if let Some(tools_image) = args.tools_image {
        config.tools_image = tools_image;
    }

    tracing::info!("Starting FabricX service");
    tracing::info!("Base directory: {}", config.base_dir.display());
    tracing::info!("Toolchain image: {}", config.tools_image);

    let registry = Arc::new(NetworkRegistry::new());
    let service = Arc::new(FabricxService::with_config(
        Arc::new(SystemExecutor::new()),
        registry,
        config,
    ));
    let router = Arc::new(ServiceRouter::new(service));

    HttpServer::new(router).run(addr).await?;
    Ok(())
}

/// CLI argument parsing tests, simulating command-line invocation.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let args: Cli = Cli::from_args(&["fabricx"], &["serve"]).unwrap();
        match args.command {
            Commands::Serve(serve) => {
                assert_eq!(serve.bind, "127.0.0.1:8080");
                assert!(serve.base_dir.is_none());
                assert!(serve.tools_image.is_none());
                assert_eq!(serve.readiness_timeout_secs, 60);
                assert_eq!(serve.join_wait_secs, 2);
            }
        }
    }

    #[test]
    fn test_cli_parse_serve_custom_bind() {
        let args: Cli = Cli::from_args(&["fabricx"], &["serve", "-b", "0.0.0.0:9090"]).unwrap();
        match args.command {
            Commands::Serve(serve) => assert_eq!(serve.bind, "0.0.0.0:9090"),
        }
    }

    #[test]
    fn test_cli_parse_serve_full_flags() {
        let args: Cli = Cli::from_args(
            &["fabricx"],
            &[
                "serve",
                "--base-dir",
                "/var/lib/fabricx",
                "--tools-image",
                "hyperledger/fabric-tools:2.4",
                "--readiness-timeout-secs",
                "120",
                "--join-wait-secs",
                "5",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Serve(serve) => {
                assert_eq!(serve.base_dir, Some(PathBuf::from("/var/lib/fabricx")));
                assert_eq!(serve.tools_image.as_deref(), Some("hyperledger/fabric-tools:2.4"));
                assert_eq!(serve.readiness_timeout_secs, 120);
                assert_eq!(serve.join_wait_secs, 5);
            }
        }
    }

    #[test]
    fn test_cli_rejects_unknown_subcommand() {
        assert!(Cli::from_args(&["fabricx"], &["destroy"]).is_err());
    }
}
