//! Praetor gateway daemon.
//!
//! Usage:
//!   praetord --backend-url http://localhost:3001
//!   praetord --config praetor.toml --port 3000 --log-dir ./logs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use praetor_core::policy::PolicyStore;
use praetor_core::tracker::BehaviorTracker;
use praetor_gateway::auth::ClaimsAuthenticator;
use praetor_gateway::forwarder::HttpForwarder;
use praetor_gateway::orchestrator::Gateway;
use praetor_gateway::server::{self, ServerConfig};
use praetor_store::audit::TracingAuditSink;
use praetor_store::log_store::LogStore;

#[derive(Parser)]
#[command(name = "praetord")]
#[command(about = "Praetor — inline request gateway with behavioral risk evaluation")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Policy configuration file (TOML)
    #[arg(short, long, default_value = "praetor.toml")]
    config: PathBuf,

    /// Base URL of the protected backend
    #[arg(long, env = "BACKEND_BASE_URL")]
    backend_url: String,

    /// Directory for JSONL security logs
    #[arg(long, default_value = "./logs")]
    log_dir: PathBuf,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    upstream_timeout_secs: u64,

    /// Bearer token protecting the admin surface; open when omitted
    #[arg(long, env = "PRAETOR_ADMIN_TOKEN")]
    admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    let policy = Arc::new(PolicyStore::load(&cli.config)?);
    let store = Arc::new(LogStore::new(cli.log_dir)?);
    let forwarder = Arc::new(HttpForwarder::new(
        cli.backend_url,
        Duration::from_secs(cli.upstream_timeout_secs),
    )?);

    let gateway = Arc::new(Gateway::new(
        policy,
        Arc::new(BehaviorTracker::new()),
        Arc::new(ClaimsAuthenticator),
        forwarder,
        Arc::new(TracingAuditSink),
        store,
    ));

    server::serve(gateway, ServerConfig { addr, admin_token: cli.admin_token }).await?;
    Ok(())
}
