//! Chart-ready shaping of attendance and assist summary rows.

use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration};

pub const EMPTY_PLACEHOLDER: &str = "—";

/// One raw summary row as returned by the attendance aggregate query.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct DailyCount {
	pub date: Date,
	pub clock_ins: u32,
	pub completed_workflows: u32,
	pub minutes_on_site: i64,
}
impl DailyCount {
	pub fn empty(date: Date) -> Self {
		Self { date, clock_ins: 0, completed_workflows: 0, minutes_on_site: 0 }
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyPoint {
	pub date: Date,
	pub clock_ins: u32,
	pub completed_workflows: u32,
	pub completion_rate: Option<f64>,
	pub completion_label: String,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AssistBreakdown {
	pub pending: u32,
	pub accepted: u32,
	pub resolved: u32,
	pub escalated: u32,
}
impl AssistBreakdown {
	pub fn total(&self) -> u32 {
		self.pending + self.accepted + self.resolved + self.escalated
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
	pub from: Date,
	pub to: Date,
	pub total_clock_ins: u32,
	pub completed_workflows: u32,
	pub completion_rate: Option<f64>,
	pub completion_label: String,
	pub average_minutes_on_site: Option<f64>,
	pub average_minutes_label: String,
	pub assist: AssistBreakdown,
	pub assist_resolution_label: String,
	pub series: Vec<DailyPoint>,
}
impl Summary {
	pub fn build(from: Date, to: Date, rows: &[DailyCount], assist: AssistBreakdown) -> Self {
		let days = fill_missing_days(from, to, rows);
		let total_clock_ins: u32 = days.iter().map(|day| day.clock_ins).sum();
		let completed_workflows: u32 = days.iter().map(|day| day.completed_workflows).sum();
		let total_minutes: i64 = days.iter().map(|day| day.minutes_on_site).sum();
		let completion_rate = percentage(completed_workflows, total_clock_ins);
		let average_minutes_on_site = (completed_workflows > 0)
			.then(|| total_minutes as f64 / f64::from(completed_workflows));
		let series = days
			.iter()
			.map(|day| {
				let rate = percentage(day.completed_workflows, day.clock_ins);

				DailyPoint {
					date: day.date,
					clock_ins: day.clock_ins,
					completed_workflows: day.completed_workflows,
					completion_rate: rate,
					completion_label: format_percentage(rate),
				}
			})
			.collect();

		Self {
			from,
			to,
			total_clock_ins,
			completed_workflows,
			completion_rate,
			completion_label: format_percentage(completion_rate),
			average_minutes_on_site,
			average_minutes_label: format_minutes(average_minutes_on_site),
			assist,
			assist_resolution_label: format_percentage(percentage(assist.resolved, assist.total())),
			series,
		}
	}
}

/// Returns one row per day in `[from, to]`, zero-filling days without data.
///
/// Duplicate rows for the same day are summed. An inverted range yields no rows.
pub fn fill_missing_days(from: Date, to: Date, rows: &[DailyCount]) -> Vec<DailyCount> {
	if from > to {
		return Vec::new();
	}

	let mut by_date: HashMap<Date, DailyCount> = HashMap::new();

	for row in rows {
		let entry = by_date.entry(row.date).or_insert_with(|| DailyCount::empty(row.date));

		entry.clock_ins += row.clock_ins;
		entry.completed_workflows += row.completed_workflows;
		entry.minutes_on_site += row.minutes_on_site;
	}

	let mut out = Vec::new();
	let mut day = from;

	loop {
		out.push(by_date.remove(&day).unwrap_or_else(|| DailyCount::empty(day)));

		if day >= to {
			break;
		}

		day += Duration::days(1);
	}

	out
}

pub fn percentage(numerator: u32, denominator: u32) -> Option<f64> {
	if denominator == 0 {
		return None;
	}

	Some(f64::from(numerator) * 100.0 / f64::from(denominator))
}

/// Whole-number percentage; an undefined rate renders as "0%".
pub fn format_percentage(value: Option<f64>) -> String {
	match value {
		Some(value) if value.is_finite() => format!("{}%", value.round() as i64),
		_ => "0%".to_string(),
	}
}

pub fn format_minutes(value: Option<f64>) -> String {
	let Some(value) = value.filter(|value| value.is_finite() && *value >= 0.0) else {
		return EMPTY_PLACEHOLDER.to_string();
	};
	let total = value.round() as i64;

	match (total / 60, total % 60) {
		(0, minutes) => format!("{minutes}m"),
		(hours, minutes) => format!("{hours}h {minutes:02}m"),
	}
}
