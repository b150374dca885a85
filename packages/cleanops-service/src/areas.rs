use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{CleanOpsService, DeactivateResponse, Error, Result};
use cleanops_domain::role::{Role, Session};
use cleanops_storage::models::{Area, AreaTask};

#[derive(Clone, Debug, Deserialize)]
pub struct TaskInput {
	pub title: String,
	#[serde(default)]
	pub requires_photo: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateAreaRequest {
	pub site_id: Uuid,
	pub name: String,
	pub description: Option<String>,
	/// Checklist in display order.
	#[serde(default)]
	pub tasks: Vec<TaskInput>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskItem {
	pub task_id: Uuid,
	pub area_id: Uuid,
	pub title: String,
	pub sort_order: i32,
	pub requires_photo: bool,
}
impl From<AreaTask> for TaskItem {
	fn from(row: AreaTask) -> Self {
		Self {
			task_id: row.task_id,
			area_id: row.area_id,
			title: row.title,
			sort_order: row.sort_order,
			requires_photo: row.requires_photo,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct AreaItem {
	pub area_id: Uuid,
	pub site_id: Uuid,
	pub name: String,
	pub description: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Area> for AreaItem {
	fn from(row: Area) -> Self {
		Self {
			area_id: row.area_id,
			site_id: row.site_id,
			name: row.name,
			description: row.description,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateAreaResponse {
	pub area: AreaItem,
	pub tasks: Vec<TaskItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateTaskRequest {
	pub title: Option<String>,
	pub sort_order: Option<i32>,
	pub requires_photo: Option<bool>,
	pub is_active: Option<bool>,
}

impl CleanOpsService {
	pub async fn create_area(
		&self,
		session: &Session,
		req: CreateAreaRequest,
	) -> Result<CreateAreaResponse> {
		crate::require_at_least(session, Role::Manager)?;

		let name = crate::required("name", &req.name)?;
		let titles = req
			.tasks
			.iter()
			.enumerate()
			.map(|(idx, task)| crate::required(&format!("tasks[{idx}].title"), &task.title))
			.collect::<Result<Vec<_>>>()?;
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;
		let site_exists: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM sites WHERE site_id = $1 AND is_active)",
		)
		.bind(req.site_id)
		.fetch_one(&mut *tx)
		.await?;

		if !site_exists {
			return Err(Error::not_found("Site not found."));
		}

		let area: Area = sqlx::query_as(
			"\
INSERT INTO areas (area_id, site_id, name, description, is_active, created_at)
VALUES ($1, $2, $3, $4, true, $5)
RETURNING area_id, site_id, name, description, is_active, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(req.site_id)
		.bind(name)
		.bind(crate::optional(req.description.as_deref()))
		.bind(now)
		.fetch_one(&mut *tx)
		.await?;
		let mut tasks = Vec::with_capacity(titles.len());

		for (idx, (title, input)) in titles.into_iter().zip(&req.tasks).enumerate() {
			let task: AreaTask = sqlx::query_as(
				"\
INSERT INTO area_tasks (task_id, area_id, title, sort_order, requires_photo, is_active)
VALUES ($1, $2, $3, $4, $5, true)
RETURNING task_id, area_id, title, sort_order, requires_photo, is_active",
			)
			.bind(Uuid::new_v4())
			.bind(area.area_id)
			.bind(title)
			.bind(idx as i32)
			.bind(input.requires_photo)
			.fetch_one(&mut *tx)
			.await?;

			tasks.push(TaskItem::from(task));
		}

		tx.commit().await?;

		tracing::info!(area_id = %area.area_id, tasks = tasks.len(), "Area created.");

		Ok(CreateAreaResponse { area: area.into(), tasks })
	}

	pub async fn list_areas(&self, site_id: Uuid) -> Result<Vec<AreaItem>> {
		let rows: Vec<Area> = sqlx::query_as(
			"\
SELECT area_id, site_id, name, description, is_active, created_at
FROM areas
WHERE site_id = $1 AND is_active
ORDER BY name ASC",
		)
		.bind(site_id)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows.into_iter().map(AreaItem::from).collect())
	}

	pub async fn list_tasks(&self, area_id: Uuid) -> Result<Vec<TaskItem>> {
		let mut conn = self.db.pool.acquire().await?;

		area_tasks(&mut conn, area_id).await
	}

	pub async fn update_task(
		&self,
		session: &Session,
		task_id: Uuid,
		req: UpdateTaskRequest,
	) -> Result<TaskItem> {
		crate::require_at_least(session, Role::Manager)?;

		let title = match req.title.as_deref() {
			Some(raw) => Some(crate::required("title", raw)?),
			None => None,
		};

		if req.sort_order.is_some_and(|order| order < 0) {
			return Err(Error::invalid("sort_order must be zero or greater."));
		}

		let row: Option<AreaTask> = sqlx::query_as(
			"\
UPDATE area_tasks
SET
	title = COALESCE($2, title),
	sort_order = COALESCE($3, sort_order),
	requires_photo = COALESCE($4, requires_photo),
	is_active = COALESCE($5, is_active)
WHERE task_id = $1
RETURNING task_id, area_id, title, sort_order, requires_photo, is_active",
		)
		.bind(task_id)
		.bind(title)
		.bind(req.sort_order)
		.bind(req.requires_photo)
		.bind(req.is_active)
		.fetch_optional(&self.db.pool)
		.await?;
		let row = row.ok_or_else(|| Error::not_found("Task not found."))?;

		tracing::info!(%task_id, "Task updated.");

		Ok(row.into())
	}

	pub async fn deactivate_area(
		&self,
		session: &Session,
		area_id: Uuid,
	) -> Result<DeactivateResponse> {
		crate::require_at_least(session, Role::Manager)?;

		let op = self.soft_delete("areas", "area_id", area_id).await?;

		tracing::info!(%area_id, ?op, "Area deactivated.");

		Ok(DeactivateResponse { id: area_id, op })
	}
}

pub(crate) async fn area_tasks(conn: &mut PgConnection, area_id: Uuid) -> Result<Vec<TaskItem>> {
	let rows: Vec<AreaTask> = sqlx::query_as(
		"\
SELECT task_id, area_id, title, sort_order, requires_photo, is_active
FROM area_tasks
WHERE area_id = $1 AND is_active
ORDER BY sort_order ASC, title ASC",
	)
	.bind(area_id)
	.fetch_all(&mut *conn)
	.await?;

	Ok(rows.into_iter().map(TaskItem::from).collect())
}
