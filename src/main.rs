use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use pool_rounds::{
    EventSource, MetricSource, RoundKeeper,
    api,
    chain::{ChainClassifier, ChainEventSource},
    config::Config,
};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Config::parse().validate().context("invalid configuration")?;

    let provider = settings.robust_provider()?;
    let keeper = settings
        .keeper_builder()
        .connect(
            ChainEventSource::new(provider.clone()),
            settings.metric_client()?,
            &ChainClassifier::new(provider),
        )
        .await
        .context("failed to initialise rounds")?;
    let keeper = Arc::new(keeper);

    let cancel = CancellationToken::new();
    let ticks = [(settings.advance_interval, false), (settings.reconcile_interval, true)].map(
        |(period, refresh_metric)| {
            tokio::spawn(run_ticks(Arc::clone(&keeper), period, refresh_metric, cancel.clone()))
        },
    );

    let listener = tokio::net::TcpListener::bind(settings.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_address))?;
    tracing::info!(address = %settings.listen_address, "Control surface listening");

    axum::serve(listener, api::router(keeper))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cancel.cancel();
    for tick in ticks {
        tick.await.context("tick task panicked")?;
    }
    tracing::info!("Shut down");
    Ok(())
}

/// Runs a keeper pass every `period` until cancelled; passes that find the keeper busy are skipped.
async fn run_ticks<S, M>(
    keeper: Arc<RoundKeeper<S, M>>,
    period: Duration,
    refresh_metric: bool,
    cancel: CancellationToken,
) where
    S: EventSource + 'static,
    M: MetricSource + 'static,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match keeper.try_tick(refresh_metric).await {
            Ok(Some(report)) => {
                for (id, error) in &report.failures {
                    tracing::warn!(round = %id, error = %error, refresh_metric, "Round not updated");
                }
            }
            Ok(None) => {}
            Err(error) => tracing::warn!(error = %error, refresh_metric, "Tick failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
