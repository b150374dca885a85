use std::time::Duration;

use time::OffsetDateTime;
use tokio::{signal, time as tokio_time};

use cleanops_service::CleanOpsService;

/// Sweeps on a fixed interval until Ctrl+C.
pub async fn run_worker(service: CleanOpsService) -> color_eyre::Result<()> {
	let every = Duration::from_secs(service.cfg.assist.sweep_interval_secs);
	let mut ticker = tokio_time::interval(every);

	ticker.set_missed_tick_behavior(tokio_time::MissedTickBehavior::Delay);

	tracing::info!(interval_secs = every.as_secs(), "Worker started.");

	loop {
		tokio::select! {
			result = signal::ctrl_c() => {
				if let Err(err) = result {
					tracing::error!(error = %err, "Failed to listen for Ctrl+C.");
				}

				break;
			}
			_ = ticker.tick() => sweep_once(&service, OffsetDateTime::now_utc()).await,
		}
	}

	service.db.pool.close().await;

	tracing::info!("Worker stopped.");

	Ok(())
}

async fn sweep_once(service: &CleanOpsService, now: OffsetDateTime) {
	match service.escalate_stale(now).await {
		Ok(report) if report.escalated > 0 =>
			tracing::info!(escalated = report.escalated, "Stale assist requests escalated."),
		Ok(_) => {},
		Err(err) => tracing::error!(error = %err, "Assist escalation sweep failed."),
	}

	match service.purge_expired_sessions(now).await {
		Ok(purged) if purged > 0 => tracing::info!(purged, "Expired sessions purged."),
		Ok(_) => {},
		Err(err) => tracing::error!(error = %err, "Session cleanup failed."),
	}
}
