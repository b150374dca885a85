use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{CleanOpsService, Error, Result};
use cleanops_domain::{
	assist::{self, AssistStatus},
	role::{Role, Session},
};
use cleanops_storage::models::AssistRequest;

const ASSIST_SELECT: &str = "\
SELECT r.*, s.name AS site_name, a.display_name AS reporter_name
FROM assist_requests r
JOIN sites s ON s.site_id = r.site_id
JOIN accounts a ON a.account_id = r.reported_by";

#[derive(Clone, Debug, Deserialize)]
pub struct AssistRequestInput {
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub description: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssistNote {
	pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssistItem {
	pub request_id: Uuid,
	pub site_id: Uuid,
	pub site_name: String,
	pub area_id: Option<Uuid>,
	pub description: String,
	pub reported_by: Uuid,
	pub reporter_name: String,
	pub status: AssistStatus,
	pub assigned_cleaner_id: Option<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssistTransitionResponse {
	pub previous: AssistStatus,
	pub request: AssistItem,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SweepReport {
	pub escalated: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct AssistRow {
	#[sqlx(flatten)]
	request: AssistRequest,
	site_name: String,
	reporter_name: String,
}
impl TryFrom<AssistRow> for AssistItem {
	type Error = Error;

	fn try_from(row: AssistRow) -> Result<Self> {
		let request = row.request;

		Ok(Self {
			request_id: request.request_id,
			site_id: request.site_id,
			site_name: row.site_name,
			area_id: request.area_id,
			description: request.description,
			reported_by: request.reported_by,
			reporter_name: row.reporter_name,
			status: request.status.parse()?,
			assigned_cleaner_id: request.assigned_cleaner_id,
			created_at: request.created_at,
			updated_at: request.updated_at,
		})
	}
}

impl CleanOpsService {
	pub async fn report(&self, session: &Session, input: AssistRequestInput) -> Result<AssistItem> {
		let description = crate::required("description", &input.description)?;
		let now = OffsetDateTime::now_utc();
		let request_id = Uuid::new_v4();
		let mut tx = self.db.pool.begin().await?;
		let site_exists: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM sites WHERE site_id = $1 AND is_active)",
		)
		.bind(input.site_id)
		.fetch_one(&mut *tx)
		.await?;

		if !site_exists {
			return Err(Error::not_found("Site not found."));
		}

		sqlx::query(
			"\
INSERT INTO assist_requests (
	request_id,
	site_id,
	area_id,
	description,
	reported_by,
	status,
	assigned_cleaner_id,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, 'pending', NULL, $6, $6)",
		)
		.bind(request_id)
		.bind(input.site_id)
		.bind(input.area_id)
		.bind(description)
		.bind(session.account_id)
		.bind(now)
		.execute(&mut *tx)
		.await?;
		insert_event(&mut tx, request_id, AssistStatus::Pending, Some(session.account_id), None, now)
			.await?;

		let item = fetch(&mut tx, request_id).await?;

		tx.commit().await?;

		tracing::info!(%request_id, site_id = %input.site_id, "Assist request reported.");

		Ok(item)
	}

	/// A cleaner taking the request becomes its assignee.
	pub async fn accept(&self, session: &Session, request_id: Uuid) -> Result<AssistTransitionResponse> {
		self.move_request(session, request_id, AssistStatus::Accepted, None).await
	}

	pub async fn resolve(
		&self,
		session: &Session,
		request_id: Uuid,
		note: AssistNote,
	) -> Result<AssistTransitionResponse> {
		self.move_request(session, request_id, AssistStatus::Resolved, note.note).await
	}

	pub async fn escalate(
		&self,
		session: &Session,
		request_id: Uuid,
		note: AssistNote,
	) -> Result<AssistTransitionResponse> {
		crate::require_at_least(session, Role::Manager)?;

		self.move_request(session, request_id, AssistStatus::Escalated, note.note).await
	}

	/// Requests that are not yet resolved, oldest first.
	pub async fn list_open(&self, site_id: Option<Uuid>) -> Result<Vec<AssistItem>> {
		let sql = format!(
			"\
{ASSIST_SELECT}
WHERE r.status <> 'resolved' AND ($1::uuid IS NULL OR r.site_id = $1)
ORDER BY r.created_at ASC, r.request_id ASC"
		);
		let rows: Vec<AssistRow> =
			sqlx::query_as(&sql).bind(site_id).fetch_all(&self.db.pool).await?;

		rows.into_iter().map(AssistItem::try_from).collect()
	}

	/// Escalates pending or accepted requests left untouched past `assist.escalate_after_minutes`.
	pub async fn escalate_stale(&self, now: OffsetDateTime) -> Result<SweepReport> {
		let after = Duration::minutes(self.cfg.assist.escalate_after_minutes);
		let mut tx = self.db.pool.begin().await?;
		let candidates: Vec<(Uuid, String, OffsetDateTime)> = sqlx::query_as(
			"\
SELECT request_id, status, updated_at
FROM assist_requests
WHERE status IN ('pending', 'accepted') AND updated_at <= $1
ORDER BY updated_at ASC
FOR UPDATE SKIP LOCKED",
		)
		.bind(now - after)
		.fetch_all(&mut *tx)
		.await?;
		let mut report = SweepReport::default();

		for (request_id, status, updated_at) in candidates {
			let status: AssistStatus = status.parse()?;

			if !assist::should_escalate(status, updated_at, now, after) {
				continue;
			}

			let next = assist::transition(status, AssistStatus::Escalated)?;

			sqlx::query("UPDATE assist_requests SET status = $2, updated_at = $3 WHERE request_id = $1")
				.bind(request_id)
				.bind(next.as_str())
				.bind(now)
				.execute(&mut *tx)
				.await?;
			insert_event(&mut tx, request_id, next, None, Some("Escalated after inactivity."), now)
				.await?;

			report.escalated += 1;

			tracing::warn!(%request_id, from = %status, "Assist request escalated.");
		}

		tx.commit().await?;

		Ok(report)
	}

	async fn move_request(
		&self,
		session: &Session,
		request_id: Uuid,
		to: AssistStatus,
		note: Option<String>,
	) -> Result<AssistTransitionResponse> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let current: Option<(String, Option<Uuid>)> = sqlx::query_as(
			"SELECT status, assigned_cleaner_id FROM assist_requests WHERE request_id = $1 FOR UPDATE",
		)
		.bind(request_id)
		.fetch_optional(&mut *tx)
		.await?;
		let (status, assignee) =
			current.ok_or_else(|| Error::not_found("Assist request not found."))?;
		let previous: AssistStatus = status.parse()?;

		if to == AssistStatus::Resolved
			&& !session.is_at_least(Role::Manager)
			&& assignee != Some(session.account_id)
		{
			return Err(Error::Forbidden {
				message: "Only the assigned cleaner or a manager may resolve this request.".to_string(),
			});
		}

		let next = assist::transition(previous, to)?;
		let assignee = match (next, session.role) {
			(AssistStatus::Accepted, Role::Cleaner) => Some(session.account_id),
			_ => assignee,
		};

		sqlx::query(
			"\
UPDATE assist_requests
SET status = $2, assigned_cleaner_id = $3, updated_at = $4
WHERE request_id = $1",
		)
		.bind(request_id)
		.bind(next.as_str())
		.bind(assignee)
		.bind(now)
		.execute(&mut *tx)
		.await?;

		let note = crate::optional(note.as_deref());

		insert_event(&mut tx, request_id, next, Some(session.account_id), note.as_deref(), now).await?;

		let request = fetch(&mut tx, request_id).await?;

		tx.commit().await?;

		tracing::info!(%request_id, from = %previous, to = %next, actor = %session.account_id, "Assist request moved.");

		Ok(AssistTransitionResponse { previous, request })
	}
}

async fn insert_event(
	conn: &mut PgConnection,
	request_id: Uuid,
	status: AssistStatus,
	actor_id: Option<Uuid>,
	note: Option<&str>,
	at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO assist_events (event_id, request_id, status, actor_id, note, at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(Uuid::new_v4())
	.bind(request_id)
	.bind(status.as_str())
	.bind(actor_id)
	.bind(note)
	.bind(at)
	.execute(&mut *conn)
	.await?;

	Ok(())
}

async fn fetch(conn: &mut PgConnection, request_id: Uuid) -> Result<AssistItem> {
	let sql = format!("{ASSIST_SELECT}\nWHERE r.request_id = $1");
	let row: Option<AssistRow> = sqlx::query_as(&sql).bind(request_id).fetch_optional(&mut *conn).await?;

	row.ok_or_else(|| Error::not_found("Assist request not found."))?.try_into()
}
