use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistStatus {
	Pending,
	Accepted,
	Resolved,
	Escalated,
}
impl AssistStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Accepted => "accepted",
			Self::Resolved => "resolved",
			Self::Escalated => "escalated",
		}
	}

	pub fn is_open(self) -> bool {
		!matches!(self, Self::Resolved)
	}
}
impl fmt::Display for AssistStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for AssistStatus {
	type Err = TransitionError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"pending" => Ok(Self::Pending),
			"accepted" => Ok(Self::Accepted),
			"resolved" => Ok(Self::Resolved),
			"escalated" => Ok(Self::Escalated),
			other => Err(TransitionError::UnknownStatus(other.to_string())),
		}
	}
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum TransitionError {
	#[error("Assist request cannot move from {from} to {to}.")]
	NotAllowed { from: AssistStatus, to: AssistStatus },
	#[error("Unknown assist status {0:?}.")]
	UnknownStatus(String),
}

pub fn transition(from: AssistStatus, to: AssistStatus) -> Result<AssistStatus, TransitionError> {
	use AssistStatus::*;

	match (from, to) {
		(Pending, Accepted)
		| (Pending, Escalated)
		| (Accepted, Resolved)
		| (Accepted, Escalated)
		| (Escalated, Accepted)
		| (Escalated, Resolved) => Ok(to),
		_ => Err(TransitionError::NotAllowed { from, to }),
	}
}

/// Pending or accepted requests untouched for longer than `after` get escalated by the sweep.
pub fn should_escalate(
	status: AssistStatus,
	updated_at: OffsetDateTime,
	now: OffsetDateTime,
	after: Duration,
) -> bool {
	matches!(status, AssistStatus::Pending | AssistStatus::Accepted) && now - updated_at >= after
}
