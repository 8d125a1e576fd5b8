//! Development server: the gateway on an in-memory credential store.
//!
//! # Usage
//!
//! ```bash
//! portcullis \
//!     --listen 127.0.0.1:8080 \
//!     --seed ./seed.json \
//!     --cookie-key "$(openssl rand -hex 64)" \
//!     --csrf-key "$(openssl rand -hex 32)" \
//!     -vv
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use clap::{ArgAction, Parser};
use portcullis::api::{AppState, gateway_routes};
use portcullis::crypto::{Argon2Hasher, random_bytes};
use portcullis::events::listeners::LoggingListener;
use portcullis::oauth::AuthorizationServer;
use portcullis::repository::SeedData;
use portcullis::{
    GatewayConfig, InMemoryCredentialStore, RandomTokenGenerator, register_event_listeners,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const CSRF_KEY_LEN: usize = 32;

/// Session, CSRF and OAuth2 authorization gateway.
#[derive(Parser, Debug)]
#[command(name = "portcullis")]
#[command(version, about = "Session cookie bridge, CSRF guard and OAuth2 server")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PORTCULLIS_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Path prefix for every route. Use "/" to mount at the root.
    #[arg(long, env = "PORTCULLIS_MOUNT", default_value = "/oauth")]
    mount: String,

    /// Hex-encoded key (at least 64 bytes) encrypting the session cookie.
    #[arg(long, env = "PORTCULLIS_COOKIE_KEY", hide_env_values = true)]
    cookie_key: Option<String>,

    /// Hex-encoded key (at least 32 bytes) signing the CSRF cookie.
    #[arg(long, env = "PORTCULLIS_CSRF_KEY", hide_env_values = true)]
    csrf_key: Option<String>,

    /// JSON file with users and clients to load at startup.
    #[arg(long, env = "PORTCULLIS_SEED")]
    seed: Option<PathBuf>,

    /// Honour X-Forwarded-Proto. Only behind a proxy that sets it.
    #[arg(long, env = "PORTCULLIS_TRUST_FORWARDED_PROTO")]
    trust_forwarded_proto: bool,

    /// Seconds between sweeps of expired sessions, codes and access tokens.
    #[arg(long, env = "PORTCULLIS_PRUNE_INTERVAL", default_value_t = 600)]
    prune_interval: u64,

    /// More output per occurrence (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    // RUST_LOG=
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // also installs the log -> tracing bridge for the library's log records
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn cookie_key(hex_key: Option<&str>) -> Result<Key, Box<dyn Error>> {
    match hex_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim())?;
            Key::try_from(bytes.as_slice())
                .map_err(|_| "cookie key must be at least 64 bytes".into())
        }
        None => {
            log::warn!(
                target: "portcullis",
                "msg=\"no cookie key configured, generated an ephemeral one\" effect=\"sessions end on restart\""
            );
            Ok(Key::generate())
        }
    }
}

fn csrf_key(hex_key: Option<&str>) -> Result<Vec<u8>, Box<dyn Error>> {
    match hex_key {
        Some(hex_key) => Ok(hex::decode(hex_key.trim())?),
        None => {
            log::warn!(
                target: "portcullis",
                "msg=\"no csrf key configured, generated an ephemeral one\""
            );
            Ok(random_bytes(CSRF_KEY_LEN))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!(target: "portcullis", "msg=\"failed to listen for ctrl-c\" error=\"{e}\"");
    }
    log::info!(target: "portcullis", "msg=\"shutting down\"");
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = GatewayConfig {
        mount: cli.mount,
        trust_forwarded_proto: cli.trust_forwarded_proto,
        ..GatewayConfig::default()
    };
    config.validate()?;

    let store = InMemoryCredentialStore::new();
    if let Some(path) = &cli.seed {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read seed file {}: {e}", path.display()))?;
        SeedData::from_json(&json)?.apply(
            &store,
            &Argon2Hasher::default(),
            &config.oauth.redirect_uri_separator,
        )?;
    }

    register_event_listeners(|registry| {
        registry.listen(LoggingListener::new());
    });

    let generator = RandomTokenGenerator::new(config.token_length);
    let server = AuthorizationServer::new(Arc::new(store), generator, config);
    let state = AppState::new(server, cookie_key(cli.cookie_key.as_deref())?);
    let csrf_key = csrf_key(cli.csrf_key.as_deref())?;

    let pruner = Arc::clone(&state.server);
    let interval = Duration::from_secs(cli.prune_interval.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = pruner.prune_expired_sessions().await {
                log::error!(target: "portcullis", "msg=\"session prune failed\" error=\"{e}\"");
            }
            if let Err(e) = pruner.prune_expired_tokens().await {
                log::error!(target: "portcullis", "msg=\"token prune failed\" error=\"{e}\"");
            }
        }
    });

    let app = gateway_routes(state, &csrf_key)?.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    log::info!(target: "portcullis", "msg=\"listening\" addr={}", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
