use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use frame_exchange::config::Config;
use frame_exchange::relay;
use frame_exchange::stats::{RelayStats, saturating_micros};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let settings = config.validate()?;
    info!(
        mode = ?settings.mode,
        producer_period_us = config.producer_period_us,
        consumer_period_us = config.consumer_period_us,
        block_size = settings.block_size,
        duration_secs = config.duration_secs,
        "starting frame relay"
    );

    let cancel = CancellationToken::new();
    let stats = Arc::new(RelayStats::default());

    // Producer and consumer run on their own OS threads; this runtime only
    // waits for the stop condition.
    let handles = relay::spawn(settings, &stats, &cancel)?;

    let run_time = config.run_time();
    tokio::select! {
        () = async {
            match run_time {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        } => info!("run time elapsed"),
        () = shutdown_signal() => info!("received shutdown signal, draining"),
    }
    cancel.cancel();

    tokio::task::spawn_blocking(move || handles.join()).await??;

    let s = stats.snapshot();
    info!(
        commits = s.commits,
        overwrites = s.overwrites,
        reads = s.reads,
        claims = s.claims,
        stale_reads = s.stale_reads,
        skipped = s.skipped,
        mean_age_us = saturating_micros(stats.age.mean()),
        "relay finished"
    );
    if s.torn > 0 {
        warn!(torn = s.torn, "torn blocks were observed");
    }

    if config.metrics {
        print!("{}", stats.to_prometheus());
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
