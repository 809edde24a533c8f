use std::sync::Arc;

use scout_service::ScoutService;
use scout_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ScoutService>,
	/// Lowercased header carrying the tenant ID.
	pub tenant_header: String,
}
impl AppState {
	pub async fn new(config: scout_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		Ok(Self::from_service(ScoutService::new(config, db, qdrant)))
	}

	pub fn from_service(service: ScoutService) -> Self {
		let tenant_header = service.cfg.service.tenant_header.clone();

		Self { service: Arc::new(service), tenant_header }
	}
}
