pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use color_eyre::eyre;
use tokio::{net::TcpListener, signal};

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = cleanops_cli::VERSION,
	rename_all = "kebab",
	styles = cleanops_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = cleanops_config::load(&args.config)?;

	cleanops_cli::init_tracing(&config.service.log_level);

	let http_addr: SocketAddr = config.service.http_bind.parse()?;

	if config.security.bind_localhost_only && !http_addr.ip().is_loopback() {
		return Err(eyre::eyre!(
			"http_bind must be a loopback address when bind_localhost_only is true."
		));
	}

	let state = AppState::new(config).await?;
	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("HTTP server stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for Ctrl+C.");

		std::future::pending::<()>().await;
	}

	tracing::info!("Received Ctrl+C, shutting down.");
}
