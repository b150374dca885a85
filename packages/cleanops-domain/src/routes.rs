//! Server-side route table for the role-aware dashboard.
//!
//! Every path the dashboard serves is listed in [`PAGES`]. [`resolve`] decides, for a path and an
//! optional session, whether the page renders, the visitor is sent elsewhere, or the path is unknown.

use serde::Serialize;

use crate::role::{Role, Session};

pub const LOGIN_PATH: &str = "/login";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
	Login,
	ClockIn,
	Scanner,
	History,
	Profile,
	ManagerDashboard,
	OpsDashboard,
	AdminDashboard,
	QrLibrary,
	QrGenerator,
	Analytics,
	Schedules,
	AssistReporting,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
	Public,
	Authenticated,
	Only(Role),
	AtLeast(Role),
}
impl Access {
	pub fn allows(self, role: Role) -> bool {
		match self {
			Self::Public | Self::Authenticated => true,
			Self::Only(required) => role == required,
			Self::AtLeast(required) => role.at_least(required),
		}
	}

	pub fn roles(self) -> Vec<Role> {
		Role::ALL.into_iter().filter(|role| self.allows(*role)).collect()
	}
}

#[derive(Clone, Copy, Debug)]
pub struct RouteEntry {
	pub path: &'static str,
	pub page: Page,
	pub access: Access,
}

pub const PAGES: &[RouteEntry] = &[
	RouteEntry { path: LOGIN_PATH, page: Page::Login, access: Access::Public },
	RouteEntry { path: "/clock-in", page: Page::ClockIn, access: Access::Only(Role::Cleaner) },
	RouteEntry { path: "/scanner", page: Page::Scanner, access: Access::Only(Role::Cleaner) },
	RouteEntry { path: "/history", page: Page::History, access: Access::Only(Role::Cleaner) },
	RouteEntry { path: "/profile", page: Page::Profile, access: Access::Authenticated },
	RouteEntry {
		path: "/manager",
		page: Page::ManagerDashboard,
		access: Access::AtLeast(Role::Manager),
	},
	RouteEntry { path: "/ops", page: Page::OpsDashboard, access: Access::AtLeast(Role::OpsManager) },
	RouteEntry { path: "/admin", page: Page::AdminDashboard, access: Access::Only(Role::Admin) },
	RouteEntry { path: "/qr-codes", page: Page::QrLibrary, access: Access::AtLeast(Role::Manager) },
	RouteEntry {
		path: "/qr-codes/new",
		page: Page::QrGenerator,
		access: Access::AtLeast(Role::Manager),
	},
	RouteEntry { path: "/analytics", page: Page::Analytics, access: Access::AtLeast(Role::Manager) },
	RouteEntry { path: "/schedules", page: Page::Schedules, access: Access::AtLeast(Role::Manager) },
	RouteEntry { path: "/assist", page: Page::AssistReporting, access: Access::Authenticated },
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteDecision {
	Render(&'static RouteEntry),
	Redirect(&'static str),
	NotFound,
}

pub fn home_for(role: Role) -> &'static str {
	match role {
		Role::Cleaner => "/clock-in",
		Role::Manager => "/manager",
		Role::OpsManager => "/ops",
		Role::Admin => "/admin",
	}
}

pub fn lookup(path: &str) -> Option<&'static RouteEntry> {
	let normalized = normalize(path);

	PAGES.iter().find(|entry| entry.path == normalized)
}

pub fn resolve(path: &str, session: Option<&Session>) -> RouteDecision {
	if normalize(path) == "/" {
		return RouteDecision::Redirect(session.map(|s| home_for(s.role)).unwrap_or(LOGIN_PATH));
	}

	let Some(entry) = lookup(path) else {
		return RouteDecision::NotFound;
	};

	match (entry.access, session) {
		(Access::Public, Some(session)) if entry.page == Page::Login =>
			RouteDecision::Redirect(home_for(session.role)),
		(Access::Public, _) => RouteDecision::Render(entry),
		(_, None) => RouteDecision::Redirect(LOGIN_PATH),
		(access, Some(session)) if access.allows(session.role) => RouteDecision::Render(entry),
		(_, Some(session)) => RouteDecision::Redirect(home_for(session.role)),
	}
}

fn normalize(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or(path);
	let trimmed = path.trim_end_matches('/');

	if trimmed.is_empty() { "/" } else { trimmed }
}

impl PartialEq for RouteEntry {
	fn eq(&self, other: &Self) -> bool {
		self.path == other.path
	}
}
impl Eq for RouteEntry {}
