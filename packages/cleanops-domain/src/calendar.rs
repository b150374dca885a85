//! Weekly calendar helpers: week bucketing and the drag/resize time grid.

use serde::Serialize;
use time::{Date, Duration, PrimitiveDateTime, Time, Weekday};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum TimeGridError {
	#[error("{0:?} is not a valid HH:MM time.")]
	InvalidTime(String),
	#[error("Slot length must divide an hour.")]
	InvalidSlot,
	#[error("Start time must be earlier than end time.")]
	EmptySpan,
	#[error("Times must fall between {start} and {end}.")]
	OutOfBounds { start: String, end: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct DayCell<E> {
	pub date: Date,
	pub weekday: Weekday,
	pub events: Vec<E>,
}

pub fn week_start(date: Date) -> Date {
	date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

pub fn week_days(date: Date) -> [Date; 7] {
	let monday = week_start(date);

	std::array::from_fn(|offset| monday + Duration::days(offset as i64))
}

/// Groups events into Monday..Sunday cells for the week containing `week_of`.
///
/// Events outside the week are dropped. Within a day, events are ordered by start and keep their
/// input order when starts are equal.
pub fn bucket_by_day<E, I, F>(week_of: Date, events: I, starts_at: F) -> Vec<DayCell<E>>
where
	I: IntoIterator<Item = E>,
	F: Fn(&E) -> PrimitiveDateTime,
{
	let mut cells: Vec<DayCell<E>> = week_days(week_of)
		.into_iter()
		.map(|date| DayCell { date, weekday: date.weekday(), events: Vec::new() })
		.collect();
	let monday = cells[0].date;

	for event in events {
		let offset = (starts_at(&event).date() - monday).whole_days();

		if let Ok(index) = usize::try_from(offset)
			&& let Some(cell) = cells.get_mut(index)
		{
			cell.events.push(event);
		}
	}
	for cell in &mut cells {
		cell.events.sort_by_key(|event| starts_at(event).time());
	}

	cells
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Span {
	/// Minutes after midnight.
	pub start: u32,
	pub end: u32,
}
impl Span {
	pub fn start_hhmm(&self) -> String {
		format_hhmm(self.start)
	}

	pub fn end_hhmm(&self) -> String {
		format_hhmm(self.end)
	}

	pub fn start_time(&self) -> Time {
		to_time(self.start)
	}

	pub fn end_time(&self) -> Time {
		to_time(self.end)
	}

	pub fn from_times(start: Time, end: Time) -> Self {
		Self { start: from_time(start), end: from_time(end) }
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DragMode {
	Move,
	ResizeStart,
	ResizeEnd,
}

#[derive(Clone, Copy, Debug)]
pub struct TimeGrid {
	slot_minutes: u32,
	day_start: u32,
	day_end: u32,
}
impl TimeGrid {
	pub fn new(slot_minutes: u32, day_start: &str, day_end: &str) -> Result<Self, TimeGridError> {
		if slot_minutes == 0 || 60 % slot_minutes != 0 {
			return Err(TimeGridError::InvalidSlot);
		}

		let day_start = parse_hhmm(day_start)?;
		let day_end = parse_hhmm(day_end)?;

		if day_start >= day_end {
			return Err(TimeGridError::EmptySpan);
		}

		Ok(Self { slot_minutes, day_start, day_end })
	}

	pub fn from_config(cfg: &cleanops_config::Calendar) -> Result<Self, TimeGridError> {
		Self::new(cfg.slot_minutes, &cfg.day_start, &cfg.day_end)
	}

	pub fn slot_minutes(&self) -> u32 {
		self.slot_minutes
	}

	/// Parses and checks a span typed in as two HH:MM strings.
	pub fn span(&self, start: &str, end: &str) -> Result<Span, TimeGridError> {
		let span = Span { start: parse_hhmm(start)?, end: parse_hhmm(end)? };

		self.check(span)
	}

	pub fn check(&self, span: Span) -> Result<Span, TimeGridError> {
		if span.start >= span.end {
			return Err(TimeGridError::EmptySpan);
		}
		if span.start < self.day_start || span.end > self.day_end {
			return Err(TimeGridError::OutOfBounds {
				start: format_hhmm(self.day_start),
				end: format_hhmm(self.day_end),
			});
		}

		Ok(span)
	}

	/// Converts a pointer offset in pixels into minutes, given the rendered height of one slot.
	pub fn delta_from_pixels(&self, pixels: f64, pixels_per_slot: f64) -> i32 {
		if !pixels.is_finite() || !pixels_per_slot.is_finite() || pixels_per_slot <= 0.0 {
			return 0;
		}

		(pixels / pixels_per_slot * f64::from(self.slot_minutes)).round() as i32
	}

	/// Applies a drag of `delta_minutes`, snapped to the slot and clamped into the day.
	pub fn apply_drag(&self, span: Span, mode: DragMode, delta_minutes: i32) -> Span {
		let slot = self.slot_minutes as i32;
		let delta = (f64::from(delta_minutes) / f64::from(slot)).round() as i32 * slot;
		let day_start = self.day_start as i32;
		let day_end = self.day_end as i32;
		let start = span.start as i32;
		let end = span.end as i32;

		let (start, end) = match mode {
			DragMode::Move => {
				let length = (end - start).min(day_end - day_start);
				let start = (start + delta).clamp(day_start, day_end - length);

				(start, start + length)
			},
			DragMode::ResizeStart => {
				let latest = (end - slot).max(day_start);

				((start + delta).clamp(day_start, latest), end)
			},
			DragMode::ResizeEnd => {
				let earliest = (start + slot).min(day_end);

				(start, (end + delta).clamp(earliest, day_end))
			},
		};

		Span { start: start as u32, end: end as u32 }
	}
}

/// Parses "HH:MM" (or "HH:MM:00" as stored by Postgres) into minutes after midnight.
pub fn parse_hhmm(raw: &str) -> Result<u32, TimeGridError> {
	cleanops_config::clock_minutes(raw).ok_or_else(|| TimeGridError::InvalidTime(raw.to_string()))
}

pub fn format_hhmm(minutes: u32) -> String {
	let minutes = minutes.min(MINUTES_PER_DAY - 1);

	format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn to_time(minutes: u32) -> Time {
	let minutes = minutes.min(MINUTES_PER_DAY - 1);

	Time::from_hms((minutes / 60) as u8, (minutes % 60) as u8, 0).unwrap_or(Time::MIDNIGHT)
}

fn from_time(time: Time) -> u32 {
	u32::from(time.hour()) * 60 + u32::from(time.minute())
}
