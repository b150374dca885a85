use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use crate::{
	CleanOpsService, Result, VisitItem,
	schedules::{VISIT_SELECT, VisitRow},
};
use cleanops_domain::{
	calendar::{self, DayCell, Span},
	role::{Role, Session},
};
use cleanops_storage::models::TrackingEvent;

#[derive(Clone, Debug, Deserialize)]
pub struct WeekQuery {
	/// Any day inside the wanted week.
	pub week_of: Date,
	pub cleaner_id: Option<Uuid>,
	pub manager_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WeekView<E> {
	pub week_start: Date,
	pub slot_minutes: u32,
	pub days: Vec<DayCell<E>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AttendanceEntry {
	pub event_id: Uuid,
	pub cleaner_id: Uuid,
	pub cleaner_name: String,
	pub site_id: Uuid,
	pub site_name: String,
	pub area_id: Option<Uuid>,
	pub event: String,
	#[serde(with = "crate::time_serde")]
	pub at: OffsetDateTime,
	pub time_label: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct VisitEntry {
	#[serde(flatten)]
	pub visit: VisitItem,
	/// Minutes after midnight, for placing the block on the grid.
	pub span: Span,
}

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
	#[sqlx(flatten)]
	event: TrackingEvent,
	site_name: String,
}

impl CleanOpsService {
	/// Clock events for one week, grouped Monday..Sunday in UTC.
	pub async fn attendance_week(
		&self,
		session: &Session,
		query: WeekQuery,
	) -> Result<WeekView<AttendanceEntry>> {
		let cleaner_id = match session.role {
			Role::Cleaner => Some(session.account_id),
			_ => query.cleaner_id,
		};
		let week_start = calendar::week_start(query.week_of);
		let from = week_start.midnight().assume_utc();
		let until = from + Duration::days(7);
		let rows: Vec<AttendanceRow> = sqlx::query_as(
			"\
SELECT
	t.event_id,
	t.cleaner_id,
	a.display_name AS cleaner_name,
	t.site_id,
	s.name AS site_name,
	t.area_id,
	t.qr_code_id,
	t.event,
	t.at
FROM live_tracking t
JOIN accounts a ON a.account_id = t.cleaner_id
JOIN sites s ON s.site_id = t.site_id
WHERE t.at >= $1 AND t.at < $2 AND ($3::uuid IS NULL OR t.cleaner_id = $3)
ORDER BY t.at ASC, t.event_id ASC",
		)
		.bind(from)
		.bind(until)
		.bind(cleaner_id)
		.fetch_all(&self.db.pool)
		.await?;
		let entries = rows.into_iter().map(|row| {
			let at = row.event.at.to_offset(time::UtcOffset::UTC);

			AttendanceEntry {
				event_id: row.event.event_id,
				cleaner_id: row.event.cleaner_id,
				cleaner_name: row.event.cleaner_name,
				site_id: row.event.site_id,
				site_name: row.site_name,
				area_id: row.event.area_id,
				event: row.event.event,
				at,
				time_label: calendar::format_hhmm(u32::from(at.hour()) * 60 + u32::from(at.minute())),
			}
		});
		let days = calendar::bucket_by_day(week_start, entries, |entry| {
			PrimitiveDateTime::new(entry.at.date(), entry.at.time())
		});

		Ok(WeekView { week_start, slot_minutes: self.grid.slot_minutes(), days })
	}

	pub async fn visits_week(
		&self,
		session: &Session,
		query: WeekQuery,
	) -> Result<WeekView<VisitEntry>> {
		crate::require_at_least(session, Role::Manager)?;

		let week_start = calendar::week_start(query.week_of);
		let week_end = week_start + Duration::days(6);
		let sql = format!(
			"\
{VISIT_SELECT}
WHERE v.is_active
	AND v.visit_date >= $1
	AND v.visit_date <= $2
	AND ($3::uuid IS NULL OR v.manager_id = $3)
ORDER BY v.visit_date ASC, v.start_time ASC, v.visit_id ASC"
		);
		let rows: Vec<VisitRow> = sqlx::query_as(&sql)
			.bind(week_start)
			.bind(week_end)
			.bind(query.manager_id)
			.fetch_all(&self.db.pool)
			.await?;
		let entries = rows.into_iter().map(|row| {
			let span = Span::from_times(row.start_time, row.end_time);

			VisitEntry { visit: VisitItem::from(row), span }
		});
		let days = calendar::bucket_by_day(week_start, entries, |entry| {
			PrimitiveDateTime::new(entry.visit.visit_date, entry.span.start_time())
		});

		Ok(WeekView { week_start, slot_minutes: self.grid.slot_minutes(), days })
	}
}
