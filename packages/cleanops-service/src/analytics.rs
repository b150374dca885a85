use serde::{Deserialize, Serialize};
use time::{Date, Duration};
use uuid::Uuid;

use crate::{CleanOpsService, Error, Result};
use cleanops_domain::{
	analytics::{AssistBreakdown, DailyCount, Summary},
	assist::AssistStatus,
	role::{Role, Session},
};

const MAX_RANGE_DAYS: i64 = 366;

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyticsRequest {
	pub from: Date,
	pub to: Date,
	pub site_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalyticsResponse {
	pub site_id: Option<Uuid>,
	#[serde(flatten)]
	pub summary: Summary,
}

impl CleanOpsService {
	/// Attendance and assist totals for `[from, to]`, bucketed by UTC day.
	pub async fn summary(&self, session: &Session, req: AnalyticsRequest) -> Result<AnalyticsResponse> {
		crate::require_at_least(session, Role::Manager)?;

		if req.from > req.to {
			return Err(Error::invalid("from must not be later than to."));
		}
		if (req.to - req.from).whole_days() >= MAX_RANGE_DAYS {
			return Err(Error::invalid(format!("Range must not exceed {MAX_RANGE_DAYS} days.")));
		}

		let from = req.from.midnight().assume_utc();
		let until = (req.to + Duration::days(1)).midnight().assume_utc();
		let rows: Vec<(Date, i64, i64, i64)> = sqlx::query_as(
			"\
WITH clock_ins AS (
	SELECT (at AT TIME ZONE 'UTC')::date AS day, count(*) AS clock_ins
	FROM live_tracking
	WHERE event = 'clock_in' AND at >= $1 AND at < $2 AND ($3::uuid IS NULL OR site_id = $3)
	GROUP BY 1
),
completed AS (
	SELECT
		(clock_in_at AT TIME ZONE 'UTC')::date AS day,
		count(*) AS completed,
		COALESCE(sum(extract(epoch FROM clock_out_at - clock_in_at))::bigint / 60, 0) AS minutes
	FROM cleaner_logs
	WHERE clock_in_at >= $1 AND clock_in_at < $2 AND ($3::uuid IS NULL OR site_id = $3)
	GROUP BY 1
)
SELECT
	COALESCE(i.day, c.day) AS day,
	COALESCE(i.clock_ins, 0)::bigint AS clock_ins,
	COALESCE(c.completed, 0)::bigint AS completed,
	COALESCE(c.minutes, 0)::bigint AS minutes
FROM clock_ins i
FULL OUTER JOIN completed c ON c.day = i.day
ORDER BY 1",
		)
		.bind(from)
		.bind(until)
		.bind(req.site_id)
		.fetch_all(&self.db.pool)
		.await?;
		let counts: Vec<DailyCount> = rows
			.into_iter()
			.map(|(date, clock_ins, completed, minutes)| DailyCount {
				date,
				clock_ins: to_count(clock_ins),
				completed_workflows: to_count(completed),
				minutes_on_site: minutes,
			})
			.collect();
		let statuses: Vec<(String, i64)> = sqlx::query_as(
			"\
SELECT status, count(*)
FROM assist_requests
WHERE created_at >= $1 AND created_at < $2 AND ($3::uuid IS NULL OR site_id = $3)
GROUP BY status",
		)
		.bind(from)
		.bind(until)
		.bind(req.site_id)
		.fetch_all(&self.db.pool)
		.await?;
		let mut assist = AssistBreakdown::default();

		for (status, count) in statuses {
			let count = to_count(count);

			match status.parse::<AssistStatus>()? {
				AssistStatus::Pending => assist.pending += count,
				AssistStatus::Accepted => assist.accepted += count,
				AssistStatus::Resolved => assist.resolved += count,
				AssistStatus::Escalated => assist.escalated += count,
			}
		}

		Ok(AnalyticsResponse {
			site_id: req.site_id,
			summary: Summary::build(req.from, req.to, &counts, assist),
		})
	}
}

fn to_count(value: i64) -> u32 {
	u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
