use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::{CleanOpsService, DeactivateResponse, Error, Result};
use cleanops_domain::{
	calendar::{DragMode, Span},
	role::{Role, Session},
};

#[derive(Clone, Debug, Deserialize)]
pub struct CreateVisitRequest {
	pub site_id: Uuid,
	pub visit_date: Date,
	/// "HH:MM".
	pub start: String,
	pub end: String,
	pub notes: Option<String>,
}

/// How a visit's times change: typed in, dragged by a snapped amount, or dragged by raw pixels.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VisitTimeChange {
	Times { start: String, end: String },
	Drag { drag: DragMode, delta_minutes: i32 },
	Pointer { drag: DragMode, pixels: f64, pixels_per_slot: f64 },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListVisitsRequest {
	pub from: Option<Date>,
	pub to: Option<Date>,
	pub manager_id: Option<Uuid>,
	pub site_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VisitItem {
	pub visit_id: Uuid,
	pub site_id: Uuid,
	pub site_name: String,
	pub manager_id: Uuid,
	pub manager_name: String,
	pub visit_date: Date,
	pub start: String,
	pub end: String,
	pub notes: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VisitRow {
	pub(crate) visit_id: Uuid,
	pub(crate) site_id: Uuid,
	pub(crate) site_name: String,
	pub(crate) manager_id: Uuid,
	pub(crate) manager_name: String,
	pub(crate) visit_date: Date,
	pub(crate) start_time: Time,
	pub(crate) end_time: Time,
	pub(crate) notes: Option<String>,
}
impl From<VisitRow> for VisitItem {
	fn from(row: VisitRow) -> Self {
		let span = Span::from_times(row.start_time, row.end_time);

		Self {
			visit_id: row.visit_id,
			site_id: row.site_id,
			site_name: row.site_name,
			manager_id: row.manager_id,
			manager_name: row.manager_name,
			visit_date: row.visit_date,
			start: span.start_hhmm(),
			end: span.end_hhmm(),
			notes: row.notes,
		}
	}
}

pub(crate) const VISIT_SELECT: &str = "\
SELECT
	v.visit_id,
	v.site_id,
	s.name AS site_name,
	v.manager_id,
	m.display_name AS manager_name,
	v.visit_date,
	v.start_time,
	v.end_time,
	v.notes
FROM ops_visits v
JOIN sites s ON s.site_id = v.site_id
JOIN accounts m ON m.account_id = v.manager_id";

impl CleanOpsService {
	pub async fn create_visit(&self, session: &Session, req: CreateVisitRequest) -> Result<VisitItem> {
		crate::require_at_least(session, Role::OpsManager)?;

		let span = self.grid.span(&req.start, &req.end)?;
		let site_exists: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM sites WHERE site_id = $1 AND is_active)",
		)
		.bind(req.site_id)
		.fetch_one(&self.db.pool)
		.await?;

		if !site_exists {
			return Err(Error::not_found("Site not found."));
		}

		let visit_id = Uuid::new_v4();

		sqlx::query(
			"\
INSERT INTO ops_visits (
	visit_id,
	site_id,
	manager_id,
	visit_date,
	start_time,
	end_time,
	notes,
	is_active,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8)",
		)
		.bind(visit_id)
		.bind(req.site_id)
		.bind(session.account_id)
		.bind(req.visit_date)
		.bind(span.start_time())
		.bind(span.end_time())
		.bind(crate::optional(req.notes.as_deref()))
		.bind(OffsetDateTime::now_utc())
		.execute(&self.db.pool)
		.await?;

		tracing::info!(%visit_id, site_id = %req.site_id, date = %req.visit_date, "Ops visit scheduled.");

		self.visit(visit_id).await
	}

	pub async fn update_visit_times(
		&self,
		session: &Session,
		visit_id: Uuid,
		change: VisitTimeChange,
	) -> Result<VisitItem> {
		crate::require_at_least(session, Role::OpsManager)?;

		let mut tx = self.db.pool.begin().await?;
		let current: Option<(Uuid, Time, Time)> = sqlx::query_as(
			"\
SELECT manager_id, start_time, end_time
FROM ops_visits
WHERE visit_id = $1 AND is_active
FOR UPDATE",
		)
		.bind(visit_id)
		.fetch_optional(&mut *tx)
		.await?;
		let (manager_id, start, end) = current.ok_or_else(|| Error::not_found("Visit not found."))?;

		check_owner(session, manager_id)?;

		let span = Span::from_times(start, end);
		let next = match change {
			VisitTimeChange::Times { start, end } => self.grid.span(&start, &end)?,
			VisitTimeChange::Drag { drag, delta_minutes } =>
				self.grid.check(self.grid.apply_drag(span, drag, delta_minutes))?,
			VisitTimeChange::Pointer { drag, pixels, pixels_per_slot } => {
				let delta = self.grid.delta_from_pixels(pixels, pixels_per_slot);

				self.grid.check(self.grid.apply_drag(span, drag, delta))?
			},
		};

		sqlx::query("UPDATE ops_visits SET start_time = $2, end_time = $3 WHERE visit_id = $1")
			.bind(visit_id)
			.bind(next.start_time())
			.bind(next.end_time())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::info!(%visit_id, start = %next.start_hhmm(), end = %next.end_hhmm(), "Ops visit moved.");

		self.visit(visit_id).await
	}

	pub async fn cancel_visit(&self, session: &Session, visit_id: Uuid) -> Result<DeactivateResponse> {
		crate::require_at_least(session, Role::OpsManager)?;

		let manager_id: Option<Uuid> =
			sqlx::query_scalar("SELECT manager_id FROM ops_visits WHERE visit_id = $1")
				.bind(visit_id)
				.fetch_optional(&self.db.pool)
				.await?;

		check_owner(session, manager_id.ok_or_else(|| Error::not_found("Visit not found."))?)?;

		let op = self.soft_delete("ops_visits", "visit_id", visit_id).await?;

		tracing::info!(%visit_id, ?op, "Ops visit cancelled.");

		Ok(DeactivateResponse { id: visit_id, op })
	}

	pub async fn list_visits(
		&self,
		session: &Session,
		req: ListVisitsRequest,
	) -> Result<Vec<VisitItem>> {
		crate::require_at_least(session, Role::Manager)?;

		if let (Some(from), Some(to)) = (req.from, req.to)
			&& from > to
		{
			return Err(Error::invalid("from must not be later than to."));
		}

		let sql = format!(
			"\
{VISIT_SELECT}
WHERE v.is_active
	AND ($1::date IS NULL OR v.visit_date >= $1)
	AND ($2::date IS NULL OR v.visit_date <= $2)
	AND ($3::uuid IS NULL OR v.manager_id = $3)
	AND ($4::uuid IS NULL OR v.site_id = $4)
ORDER BY v.visit_date ASC, v.start_time ASC, v.visit_id ASC"
		);
		let rows: Vec<VisitRow> = sqlx::query_as(&sql)
			.bind(req.from)
			.bind(req.to)
			.bind(req.manager_id)
			.bind(req.site_id)
			.fetch_all(&self.db.pool)
			.await?;

		Ok(rows.into_iter().map(VisitItem::from).collect())
	}

	async fn visit(&self, visit_id: Uuid) -> Result<VisitItem> {
		let sql = format!("{VISIT_SELECT}\nWHERE v.visit_id = $1");
		let row: Option<VisitRow> =
			sqlx::query_as(&sql).bind(visit_id).fetch_optional(&self.db.pool).await?;

		row.map(VisitItem::from).ok_or_else(|| Error::not_found("Visit not found."))
	}
}

/// Visits belong to the ops manager who booked them; admins may edit any.
fn check_owner(session: &Session, manager_id: Uuid) -> Result<()> {
	if session.account_id == manager_id || session.role == Role::Admin {
		return Ok(());
	}

	Err(Error::Forbidden { message: "Only the visit's owner may change it.".to_string() })
}
