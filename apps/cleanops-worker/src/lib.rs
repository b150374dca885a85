pub mod worker;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use cleanops_service::CleanOpsService;
use cleanops_storage::{blobs::FsBlobStore, db::Db};

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

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let blobs = Arc::new(FsBlobStore::new(&config.storage.blobs));
	let service = CleanOpsService::new(config, db, blobs)?;

	worker::run_worker(service).await
}
