//! Cleaner clock-in/out and the checklist and photo workflow between them.
//!
//! Workflow state lives in `cleaner_workflows` and is rewritten after every step under a row lock,
//! so a reload or a second device always sees the latest step.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{CleanOpsService, Error, Result, TaskItem, areas::area_tasks};
use cleanops_domain::{
	role::{Role, Session},
	workflow::{WorkflowError, WorkflowLimits, WorkflowState},
};
use cleanops_storage::models::{CleanerLog, CleanerWorkflow};

const HISTORY_DEFAULT_LIMIT: i64 = 50;
const HISTORY_MAX_LIMIT: i64 = 500;

#[derive(Clone, Debug, Deserialize)]
pub struct ClockInRequest {
	/// Raw text decoded from the QR code.
	pub scanned: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaskCompletionRequest {
	pub task_id: Uuid,
	#[serde(default = "default_done")]
	pub done: bool,
}

#[derive(Clone, Debug)]
pub struct PhotoUploadRequest {
	pub bytes: Vec<u8>,
	pub content_type: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClockOutRequest {
	pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowView {
	pub stage: &'static str,
	pub step: &'static str,
	pub state: WorkflowState,
	pub checklist: Vec<TaskItem>,
	pub min_photos: u32,
	pub max_photos: u32,
	/// Public links for the photos already uploaded in this visit.
	pub photo_urls: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClockOutResponse {
	pub log_id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub clock_in_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub clock_out_at: OffsetDateTime,
	pub minutes_on_site: i64,
	pub tasks_completed: usize,
	pub photos: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryRequest {
	/// Another cleaner's history; managers and above only.
	pub cleaner_id: Option<Uuid>,
	pub from: Option<Date>,
	pub to: Option<Date>,
	pub limit: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryItem {
	pub log_id: Uuid,
	pub site_id: Uuid,
	pub site_name: String,
	pub area_id: Option<Uuid>,
	pub task_ids: Vec<Uuid>,
	pub photo_urls: Vec<String>,
	pub notes: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub clock_in_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub clock_out_at: OffsetDateTime,
	pub minutes_on_site: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
	#[sqlx(flatten)]
	log: CleanerLog,
	site_name: String,
}

impl CleanOpsService {
	pub async fn workflow(&self, session: &Session) -> Result<WorkflowView> {
		crate::require_exact(session, Role::Cleaner)?;

		let mut conn = self.db.pool.acquire().await?;
		let state = load_state(&mut conn, session.account_id, false).await?;

		self.view(&mut conn, state).await
	}

	pub async fn clock_in(&self, session: &Session, req: ClockInRequest) -> Result<WorkflowView> {
		crate::require_exact(session, Role::Cleaner)?;

		let scan = self.resolve_scan(&req.scanned).await?;
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let mut state = load_state(&mut tx, session.account_id, true).await?;

		state.clock_in(&scan.payload, now)?;

		sqlx::query(
			"\
INSERT INTO live_tracking (event_id, cleaner_id, site_id, area_id, qr_code_id, event, at)
VALUES ($1, $2, $3, $4, $5, 'clock_in', $6)",
		)
		.bind(Uuid::new_v4())
		.bind(session.account_id)
		.bind(scan.payload.site_id)
		.bind(scan.payload.area_id)
		.bind(scan.payload.code_id)
		.bind(now)
		.execute(&mut *tx)
		.await?;
		save_state(&mut tx, session.account_id, &state, now).await?;

		let view = self.view(&mut tx, state).await?;

		tx.commit().await?;

		tracing::info!(
			cleaner_id = %session.account_id,
			site_id = %scan.payload.site_id,
			qr_code_id = %scan.payload.code_id,
			"Cleaner clocked in."
		);

		Ok(view)
	}

	pub async fn complete_task(
		&self,
		session: &Session,
		req: TaskCompletionRequest,
	) -> Result<WorkflowView> {
		self.step(session, "task", |state, checklist, _| {
			if req.done {
				state.complete_task(req.task_id, checklist)
			} else {
				state.reopen_task(req.task_id)
			}
		})
		.await
	}

	pub async fn advance(&self, session: &Session) -> Result<WorkflowView> {
		self.step(session, "advance", |state, checklist, limits| {
			state.advance(checklist, limits).map(|_| ())
		})
		.await
	}

	pub async fn back(&self, session: &Session) -> Result<WorkflowView> {
		self.step(session, "back", |state, _, _| state.back().map(|_| ())).await
	}

	pub async fn upload_photo(
		&self,
		session: &Session,
		req: PhotoUploadRequest,
	) -> Result<WorkflowView> {
		crate::require_exact(session, Role::Cleaner)?;

		let extension = photo_extension(&req.content_type)?;

		if req.bytes.is_empty() {
			return Err(Error::invalid("Photo upload is empty."));
		}

		let now = OffsetDateTime::now_utc();
		let key = format!("photos/{}/{}.{extension}", session.account_id, Uuid::new_v4());
		let mut tx = self.db.pool.begin().await?;
		let mut state = load_state(&mut tx, session.account_id, true).await?;

		state.add_photo(key.clone(), self.limits)?;
		// Row lock stays held across the blob write.
		self.blobs.put(&key, &req.bytes).await?;

		let stored = async {
			save_state(&mut tx, session.account_id, &state, now).await?;

			let view = self.view(&mut tx, state).await?;

			tx.commit().await?;

			Ok::<_, Error>(view)
		}
		.await;
		let view = match stored {
			Ok(view) => view,
			Err(err) => {
				self.discard_blob(&key).await;

				return Err(err);
			},
		};

		tracing::info!(cleaner_id = %session.account_id, key = %key, bytes = req.bytes.len(), "Photo uploaded.");

		Ok(view)
	}

	pub async fn clock_out(&self, session: &Session, req: ClockOutRequest) -> Result<ClockOutResponse> {
		crate::require_exact(session, Role::Cleaner)?;

		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let mut state = load_state(&mut tx, session.account_id, true).await?;
		let checklist = match state.active() {
			Some(visit) => checklist_ids(&mut tx, visit.area_id).await?,
			None => Vec::new(),
		};
		let visit = state.finish(&checklist, self.limits)?;
		let log_id = Uuid::new_v4();

		sqlx::query(
			"\
INSERT INTO live_tracking (event_id, cleaner_id, site_id, area_id, qr_code_id, event, at)
VALUES ($1, $2, $3, $4, $5, 'clock_out', $6)",
		)
		.bind(Uuid::new_v4())
		.bind(session.account_id)
		.bind(visit.site_id)
		.bind(visit.area_id)
		.bind(visit.qr_code_id)
		.bind(now)
		.execute(&mut *tx)
		.await?;
		sqlx::query(
			"\
INSERT INTO cleaner_logs (
	log_id,
	cleaner_id,
	site_id,
	area_id,
	task_ids,
	photo_paths,
	notes,
	clock_in_at,
	clock_out_at,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)",
		)
		.bind(log_id)
		.bind(session.account_id)
		.bind(visit.site_id)
		.bind(visit.area_id)
		.bind(&visit.completed_task_ids)
		.bind(&visit.photo_paths)
		.bind(crate::optional(req.notes.as_deref()))
		.bind(visit.clock_in_at)
		.bind(now)
		.execute(&mut *tx)
		.await?;
		save_state(&mut tx, session.account_id, &state, now).await?;

		tx.commit().await?;

		let minutes_on_site = (now - visit.clock_in_at).whole_minutes();

		tracing::info!(
			cleaner_id = %session.account_id,
			site_id = %visit.site_id,
			%log_id,
			minutes_on_site,
			"Cleaner clocked out."
		);

		Ok(ClockOutResponse {
			log_id,
			clock_in_at: visit.clock_in_at,
			clock_out_at: now,
			minutes_on_site,
			tasks_completed: visit.completed_task_ids.len(),
			photos: visit.photo_paths.len(),
		})
	}

	/// Completed visits, newest first.
	pub async fn history(&self, session: &Session, req: HistoryRequest) -> Result<Vec<HistoryItem>> {
		let cleaner_id = match req.cleaner_id {
			Some(other) if other != session.account_id => {
				crate::require_at_least(session, Role::Manager)?;

				other
			},
			_ => session.account_id,
		};

		if let (Some(from), Some(to)) = (req.from, req.to)
			&& from > to
		{
			return Err(Error::invalid("from must not be later than to."));
		}

		let limit = req.limit.unwrap_or(HISTORY_DEFAULT_LIMIT).clamp(1, HISTORY_MAX_LIMIT);
		let from = req.from.map(|date| date.midnight().assume_utc());
		let until = req.to.map(|date| (date + Duration::days(1)).midnight().assume_utc());
		let rows: Vec<HistoryRow> = sqlx::query_as(
			"\
SELECT l.*, s.name AS site_name
FROM cleaner_logs l
JOIN sites s ON s.site_id = l.site_id
WHERE l.cleaner_id = $1
	AND ($2::timestamptz IS NULL OR l.clock_out_at >= $2)
	AND ($3::timestamptz IS NULL OR l.clock_out_at < $3)
ORDER BY l.clock_out_at DESC, l.log_id ASC
LIMIT $4",
		)
		.bind(cleaner_id)
		.bind(from)
		.bind(until)
		.bind(limit)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|row| {
				let log = row.log;

				HistoryItem {
					log_id: log.log_id,
					site_id: log.site_id,
					site_name: row.site_name,
					area_id: log.area_id,
					task_ids: log.task_ids,
					photo_urls: log.photo_paths.iter().map(|key| self.blobs.public_url(key)).collect(),
					notes: log.notes,
					clock_in_at: log.clock_in_at,
					clock_out_at: log.clock_out_at,
					minutes_on_site: (log.clock_out_at - log.clock_in_at).whole_minutes(),
				}
			})
			.collect())
	}

	async fn step<F>(&self, session: &Session, action: &'static str, apply: F) -> Result<WorkflowView>
	where
		F: FnOnce(&mut WorkflowState, &[Uuid], WorkflowLimits) -> Result<(), WorkflowError>,
	{
		crate::require_exact(session, Role::Cleaner)?;

		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let mut state = load_state(&mut tx, session.account_id, true).await?;
		let checklist = match state.active() {
			Some(visit) => checklist_ids(&mut tx, visit.area_id).await?,
			None => Vec::new(),
		};

		apply(&mut state, &checklist, self.limits)?;
		save_state(&mut tx, session.account_id, &state, now).await?;

		let view = self.view(&mut tx, state).await?;

		tx.commit().await?;

		tracing::info!(cleaner_id = %session.account_id, action, step = view.step, "Workflow updated.");

		Ok(view)
	}

	async fn view(&self, conn: &mut PgConnection, state: WorkflowState) -> Result<WorkflowView> {
		let (checklist, photo_urls) = match state.active() {
			Some(visit) => {
				let tasks = match visit.area_id {
					Some(area_id) => area_tasks(conn, area_id).await?,
					None => Vec::new(),
				};
				let urls = visit.photo_paths.iter().map(|key| self.blobs.public_url(key)).collect();

				(tasks, urls)
			},
			None => (Vec::new(), Vec::new()),
		};

		Ok(WorkflowView {
			stage: state.stage(),
			step: state.position(),
			state,
			checklist,
			min_photos: self.limits.min_photos,
			max_photos: self.limits.max_photos,
			photo_urls,
		})
	}
}

/// With `lock`, a default row is seeded first so the first visit has a row to lock and two devices
/// starting at once serialize on it.
async fn load_state(conn: &mut PgConnection, cleaner_id: Uuid, lock: bool) -> Result<WorkflowState> {
	let sql = if lock {
		sqlx::query(
			"\
INSERT INTO cleaner_workflows (cleaner_id, state, updated_at)
VALUES ($1, $2, $3)
ON CONFLICT (cleaner_id) DO NOTHING",
		)
		.bind(cleaner_id)
		.bind(serde_json::to_value(WorkflowState::default())?)
		.bind(OffsetDateTime::now_utc())
		.execute(&mut *conn)
		.await?;

		"SELECT cleaner_id, state, updated_at FROM cleaner_workflows WHERE cleaner_id = $1 FOR UPDATE"
	} else {
		"SELECT cleaner_id, state, updated_at FROM cleaner_workflows WHERE cleaner_id = $1"
	};
	let row: Option<CleanerWorkflow> =
		sqlx::query_as(sql).bind(cleaner_id).fetch_optional(&mut *conn).await?;

	match row {
		Some(row) => Ok(serde_json::from_value(row.state)?),
		None => Ok(WorkflowState::default()),
	}
}

async fn save_state(
	conn: &mut PgConnection,
	cleaner_id: Uuid,
	state: &WorkflowState,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO cleaner_workflows (cleaner_id, state, updated_at)
VALUES ($1, $2, $3)
ON CONFLICT (cleaner_id) DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at",
	)
	.bind(cleaner_id)
	.bind(serde_json::to_value(state)?)
	.bind(now)
	.execute(&mut *conn)
	.await?;

	Ok(())
}

/// Task ids the visit must cover. Clock codes carry no area and so no checklist.
async fn checklist_ids(conn: &mut PgConnection, area_id: Option<Uuid>) -> Result<Vec<Uuid>> {
	let Some(area_id) = area_id else {
		return Ok(Vec::new());
	};

	Ok(area_tasks(conn, area_id).await?.into_iter().map(|task| task.task_id).collect())
}

fn photo_extension(content_type: &str) -> Result<&'static str> {
	let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	match mime.as_str() {
		"image/jpeg" | "image/jpg" => Ok("jpg"),
		"image/png" => Ok("png"),
		"image/webp" => Ok("webp"),
		"image/heic" => Ok("heic"),
		_ => Err(Error::invalid(format!("Unsupported photo content type {content_type:?}."))),
	}
}

fn default_done() -> bool {
	true
}
