//! Chat relay server binary.
//!
//! Serves `POST /api/chat` (origin-gated, streaming) and `GET /health`.
//! Every option can come from a flag, the environment or a `.env` file.

use std::time::Duration;

use chatrelay_api::config::{DEFAULT_UPSTREAM_URL, RelayConfig};
use chatrelay_core::frame::DEFAULT_MAX_LINE_LEN;
use chatrelay_core::guard::{AllowList, DomainMatch};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

/// How `--allowed-domains` entries are matched against Origin/Referer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MatchArg {
    /// Domain appears anywhere in the header value.
    Substring,
    /// Header parses as a URL whose host is the domain or a subdomain.
    Host,
}

impl From<MatchArg> for DomainMatch {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Substring => DomainMatch::Substring,
            MatchArg::Host => DomainMatch::Host,
        }
    }
}

/// CLI arguments for the relay server.
#[derive(Parser)]
#[command(name = "chatrelay_server", about = "Chat relay server", version)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Upstream API key.
    #[arg(long, env = "PERSONAL_AI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Domain identifier sent with every upstream request.
    #[arg(long, env = "DOMAIN_NAME")]
    domain_name: Option<String>,

    /// Upstream streaming endpoint.
    #[arg(long, env = "PERSONAL_AI_API_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    /// Domains allowed to call the relay, comma-separated.
    #[arg(long, env = "ALLOWED_DOMAINS", value_delimiter = ',')]
    allowed_domains: Vec<String>,

    /// Allow-list matching strategy.
    #[arg(long, env = "DOMAIN_MATCH", value_enum, default_value_t = MatchArg::Substring)]
    domain_match: MatchArg,

    /// Upstream connect timeout in seconds. Unset waits indefinitely.
    #[arg(long, env = "UPSTREAM_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: Option<u64>,

    /// Upstream per-read timeout in seconds while streaming.
    #[arg(long, env = "UPSTREAM_READ_TIMEOUT_SECS")]
    read_timeout_secs: Option<u64>,

    /// Longest upstream line relayed, in bytes. Longer lines are dropped.
    #[arg(long, env = "UPSTREAM_MAX_LINE_BYTES", default_value_t = DEFAULT_MAX_LINE_LEN)]
    max_line_bytes: usize,
}

impl Args {
    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn relay_config(self) -> RelayConfig {
        let allow_list = AllowList::new(self.allowed_domains, self.domain_match.into());
        RelayConfig {
            api_key: self.api_key,
            domain_name: self.domain_name,
            upstream_url: self.upstream_url,
            allow_list,
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
            read_timeout: self.read_timeout_secs.map(Duration::from_secs),
            max_line_len: self.max_line_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,chatrelay_api=debug,chatrelay_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let bind_addr = args.bind_addr();
    let config = args.relay_config();

    if config.credentials().is_err() {
        warn!("upstream credentials incomplete; chat requests will fail until configured");
    }
    if config.allow_list.domains().is_empty() {
        warn!("no allowed domains configured; only local development origins are accepted");
    }

    info!(
        upstream_url = %config.upstream_url,
        allowed_origins = ?config.allow_list.allowed_origins(),
        max_line_len = config.max_line_len,
        strategy = ?config.allow_list.strategy(),
        "starting chatrelay_server"
    );

    let state = chatrelay_api::AppState::new(config)?;
    let app = chatrelay_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
