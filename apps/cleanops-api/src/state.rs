use std::sync::Arc;

use cleanops_config::Config;
use cleanops_service::CleanOpsService;
use cleanops_storage::{blobs::FsBlobStore, db::Db};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CleanOpsService>,
}
impl AppState {
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let state = Self::build(config, db)?;

		state.service.bootstrap_admin().await?;

		Ok(state)
	}

	/// State whose pool connects on first use; nothing touches Postgres until a query runs.
	pub fn lazy(config: Config) -> color_eyre::Result<Self> {
		let db = Db::connect_lazy(&config.storage.postgres)?;

		Self::build(config, db)
	}

	fn build(config: Config, db: Db) -> color_eyre::Result<Self> {
		let blobs = Arc::new(FsBlobStore::new(&config.storage.blobs));
		let service = CleanOpsService::new(config, db, blobs)?;

		Ok(Self { service: Arc::new(service) })
	}
}
