use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Cleaner,
	Manager,
	OpsManager,
	Admin,
}
impl Role {
	pub const ALL: [Role; 4] = [Role::Cleaner, Role::Manager, Role::OpsManager, Role::Admin];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Cleaner => "cleaner",
			Self::Manager => "manager",
			Self::OpsManager => "ops_manager",
			Self::Admin => "admin",
		}
	}

	/// Oversight tier; higher ranks inherit everything lower ranks may do.
	pub fn rank(self) -> u8 {
		match self {
			Self::Cleaner => 0,
			Self::Manager => 1,
			Self::OpsManager => 2,
			Self::Admin => 3,
		}
	}

	pub fn at_least(self, other: Role) -> bool {
		self.rank() >= other.rank()
	}
}
impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim() {
			"cleaner" => Ok(Self::Cleaner),
			"manager" => Ok(Self::Manager),
			"ops_manager" => Ok(Self::OpsManager),
			"admin" => Ok(Self::Admin),
			other => Err(UnknownRole(other.to_string())),
		}
	}
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role {0:?}.")]
pub struct UnknownRole(pub String);

/// The authenticated identity every service call receives explicitly.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Session {
	pub account_id: Uuid,
	pub role: Role,
	pub display_name: String,
}
impl Session {
	pub fn is_at_least(&self, role: Role) -> bool {
		self.role.at_least(role)
	}
}
