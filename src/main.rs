//! matchday-back binary entrypoint: wires storage, notification delivery and the scheduled sweeper.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchday_back::{
    config::AppConfig,
    dao::match_store::{InMemoryStore, MatchStore},
    services::{
        channels::{ChannelKind, InboxChannel, LogChannel, NotificationChannel},
        match_service,
        notification_service::NotificationDispatcher,
        sweeper,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let channel = build_channel(&config).context("building notification channel")?;
    let (dispatcher, worker) =
        NotificationDispatcher::spawn(channel, Some(config.delivery_timeout));

    let store: Arc<dyn MatchStore> = Arc::new(InMemoryStore::new());
    store
        .health_check()
        .await
        .context("checking storage availability")?;

    let state = AppState::new(config, store, dispatcher.clone());
    let (players, matches) = match_service::restore(&state)
        .await
        .context("restoring persisted matches")?;
    info!(players, matches, "state restored");

    let sweeper = tokio::spawn(sweeper::run(state.clone()));
    info!(
        interval = ?state.config().sweep_interval,
        channel = dispatcher.channel_name(),
        "matchday-back running"
    );

    shutdown_signal().await;
    info!("shutting down");

    sweeper.abort();
    let _ = sweeper.await;
    dispatcher.flush().await;
    drop(state);
    drop(dispatcher);
    if let Err(err) = worker.await {
        warn!(error = %err, "notification worker ended abnormally");
    }

    Ok(())
}

/// Pick the delivery channel named in the configuration.
fn build_channel(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    let channel: Arc<dyn NotificationChannel> = match config.channel {
        ChannelKind::Log => Arc::new(LogChannel),
        ChannelKind::Inbox => Arc::new(InboxChannel::new()),
        ChannelKind::Push => push_channel(config)?,
    };
    Ok(channel)
}

#[cfg(feature = "push-channel")]
fn push_channel(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    use matchday_back::services::channels::PushChannel;

    let endpoint = config
        .push_endpoint
        .clone()
        .context("`push_endpoint` is required for the push channel")?;
    Ok(Arc::new(PushChannel::new(endpoint)?))
}

#[cfg(not(feature = "push-channel"))]
fn push_channel(_config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    anyhow::bail!("push channel support was not compiled in (enable the `push-channel` feature)")
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,matchday_back=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
