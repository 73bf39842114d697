use crate::server::{
    ServerState,
    sync::{DEFAULT_CAPACITY, DEFAULT_REFRESH_INTERVAL, QueryCache, RefreshPolicy},
};
use agora_common::{
    model::auth::AuthEvent,
    util::{NonPositiveDurationError, PositiveDuration},
};
use agora_db::{
    client::BackendClient,
    memory::MemoryRecordStore,
    postgres::PgRecordStore,
    storage::LocalObjectStore,
    store::{RecordStore, StoreError},
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid duration in environment: {0}")]
    Duration(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Store(#[from] StoreError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_url() -> String {
    "/uploads".into()
}

fn default_refresh_interval_ms() -> u64 {
    u64::try_from(DEFAULT_REFRESH_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

fn default_cache_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    /// Without a database, records live in memory and are gone on restart.
    database_url: Option<String>,
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
    /// Base URL uploaded images are served from.
    #[serde(default = "default_public_url")]
    public_url: String,
    #[serde(default = "default_refresh_interval_ms")]
    refresh_interval_ms: u64,
    #[serde(default = "default_cache_capacity")]
    cache_capacity: usize,
    session_lifetime_hours: Option<u64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agora_api=debug,agora_db=debug,agora_common=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn backend(env: &Env) -> Result<BackendClient, InitError> {
    let records: Arc<dyn RecordStore> = if let Some(database_url) = &env.database_url {
        info!("Using postgres backend");
        Arc::new(PgRecordStore::connect(database_url).await?)
    } else {
        warn!("DATABASE_URL is not set, keeping all records in memory");
        Arc::new(MemoryRecordStore::new())
    };
    let objects = LocalObjectStore::new(&env.upload_dir, &env.public_url);
    info!(
        upload_dir = %env.upload_dir.display(),
        public_url = %env.public_url,
        "Storing images locally"
    );

    let session_lifetime = env
        .session_lifetime_hours
        .map(|hours| PositiveDuration::try_from(Duration::from_secs(hours.saturating_mul(3600))))
        .transpose()?;

    Ok(BackendClient::new(records, Arc::new(objects), session_lifetime))
}

async fn log_auth_events(mut events: Receiver<AuthEvent>, shutdown: CancellationToken) {
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(AuthEvent::SignedIn(user)) => {
                info!(user = %user.id, handle = user.handle.get(), "Auth: signed in");
            }
            Ok(AuthEvent::SignedOut(user)) => info!(user = %user, "Auth: signed out"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Auth event listener fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "Could not listen for ctrl-c");
        return;
    }

    info!("Shutting down");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let client = backend(&env).await?;
    let refresh_interval = Duration::from_millis(env.refresh_interval_ms);
    let refresh_interval = PositiveDuration::try_from(refresh_interval)?.to_std();
    let state = ServerState {
        client: client.clone(),
        cache: Arc::new(QueryCache::new(
            RefreshPolicy {
                interval: refresh_interval,
            },
            env.cache_capacity,
        )),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(log_auth_events(client.on_auth_change(), shutdown.clone()));

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes()
        .nest_service("/uploads", ServeDir::new(&env.upload_dir))
        .layer(tracing_layer)
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
