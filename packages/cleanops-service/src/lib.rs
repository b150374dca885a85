pub mod analytics;
pub mod areas;
pub mod assist;
pub mod attendance;
pub mod auth;
pub mod calendar;
pub mod directory;
pub mod qr_codes;
pub mod schedules;
pub mod time_serde;

mod error;

use std::sync::Arc;

use cleanops_config::Config;
use cleanops_domain::{
	calendar::TimeGrid,
	qr::QrSigner,
	role::{Role, Session},
	workflow::WorkflowLimits,
};
use cleanops_storage::{blobs::BlobStore, db::Db};

pub use analytics::{AnalyticsRequest, AnalyticsResponse};
pub use areas::{
	AreaItem, CreateAreaRequest, CreateAreaResponse, TaskInput, TaskItem, UpdateTaskRequest,
};
pub use assist::{AssistItem, AssistNote, AssistRequestInput, AssistTransitionResponse, SweepReport};
pub use attendance::{
	ClockInRequest, ClockOutRequest, ClockOutResponse, HistoryItem, HistoryRequest,
	PhotoUploadRequest, TaskCompletionRequest, WorkflowView,
};
pub use auth::{CreateAccountRequest, CreateAccountResponse, LoginRequest, LoginResponse};
pub use calendar::{AttendanceEntry, VisitEntry, WeekQuery, WeekView};
pub use directory::{
	CleanerItem, CreateCustomerRequest, CreateSiteRequest, CustomerItem, DeactivateResponse,
	SiteItem,
};
pub use error::{Error, Result};
pub use qr_codes::{GenerateQrRequest, ListQrRequest, QrCodeResponse, QrDeleteResponse, ScanResult};
pub use schedules::{CreateVisitRequest, ListVisitsRequest, VisitItem, VisitTimeChange};

/// Outcome of a soft mutation; `None` means the row was already in the requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
	Add,
	Update,
	None,
	Delete,
}

pub struct CleanOpsService {
	pub cfg: Config,
	pub db: Db,
	pub blobs: Arc<dyn BlobStore>,
	signer: QrSigner,
	grid: TimeGrid,
	limits: WorkflowLimits,
}
impl CleanOpsService {
	pub fn new(cfg: Config, db: Db, blobs: Arc<dyn BlobStore>) -> Result<Self> {
		let signer = QrSigner::new(&cfg.security.qr_signing_key);
		let grid = TimeGrid::from_config(&cfg.calendar)?;
		let limits = WorkflowLimits::from(&cfg.workflow);

		Ok(Self { cfg, db, blobs, signer, grid, limits })
	}

	pub fn grid(&self) -> &TimeGrid {
		&self.grid
	}

	pub fn limits(&self) -> WorkflowLimits {
		self.limits
	}

	/// Removes a blob whose owning row never landed.
	pub(crate) async fn discard_blob(&self, key: &str) {
		if let Err(err) = self.blobs.delete(key).await {
			tracing::warn!(key, error = %err, "Failed to remove orphaned blob.");
		}
	}
}

pub(crate) fn require_at_least(session: &Session, role: Role) -> Result<()> {
	if session.is_at_least(role) {
		return Ok(());
	}

	Err(Error::Forbidden { message: format!("This action requires the {role} role or higher.") })
}

pub(crate) fn require_exact(session: &Session, role: Role) -> Result<()> {
	if session.role == role {
		return Ok(());
	}

	Err(Error::Forbidden { message: format!("This action is only available to the {role} role.") })
}

/// Trims a required text field, rejecting blanks.
pub(crate) fn required(field: &str, value: &str) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::invalid(format!("{field} is required.")));
	}

	Ok(trimmed.to_string())
}

pub(crate) fn optional(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
