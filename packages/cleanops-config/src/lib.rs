mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Assist, Blobs, Calendar, Config, Postgres, Qr, Security, Service, Storage, Workflow,
};

use std::{fs, path::Path};

const MIN_QR_SIGNING_KEY_CHARS: usize = 16;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const MAX_ESCALATE_AFTER_MINUTES: i64 = 60 * 24 * 7;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.log_level", &cfg.service.log_level),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("storage.blobs.root", &cfg.storage.blobs.root),
		("storage.blobs.public_base_url", &cfg.storage.blobs.public_base_url),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.blobs.max_upload_bytes == 0 {
		return Err(Error::Validation {
			message: "storage.blobs.max_upload_bytes must be greater than zero.".to_string(),
		});
	}
	if cfg.security.session_ttl_hours <= 0 {
		return Err(Error::Validation {
			message: "security.session_ttl_hours must be greater than zero.".to_string(),
		});
	}
	if cfg.security.session_ttl_hours > MAX_SESSION_TTL_HOURS {
		return Err(Error::Validation {
			message: format!("security.session_ttl_hours must be at most {MAX_SESSION_TTL_HOURS}."),
		});
	}
	if cfg.security.qr_signing_key.chars().count() < MIN_QR_SIGNING_KEY_CHARS {
		return Err(Error::Validation {
			message: format!(
				"security.qr_signing_key must be at least {MIN_QR_SIGNING_KEY_CHARS} characters."
			),
		});
	}
	if cfg.security.min_password_chars == 0 {
		return Err(Error::Validation {
			message: "security.min_password_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.workflow.max_photos == 0 {
		return Err(Error::Validation {
			message: "workflow.max_photos must be greater than zero.".to_string(),
		});
	}
	if cfg.workflow.min_photos > cfg.workflow.max_photos {
		return Err(Error::Validation {
			message: "workflow.min_photos must be less than or equal to workflow.max_photos."
				.to_string(),
		});
	}
	if cfg.assist.escalate_after_minutes <= 0 {
		return Err(Error::Validation {
			message: "assist.escalate_after_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.assist.escalate_after_minutes > MAX_ESCALATE_AFTER_MINUTES {
		return Err(Error::Validation {
			message: format!(
				"assist.escalate_after_minutes must be at most {MAX_ESCALATE_AFTER_MINUTES}."
			),
		});
	}
	if cfg.assist.sweep_interval_secs == 0 {
		return Err(Error::Validation {
			message: "assist.sweep_interval_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.calendar.slot_minutes == 0 || 60 % cfg.calendar.slot_minutes != 0 {
		return Err(Error::Validation {
			message: "calendar.slot_minutes must be a divisor of 60.".to_string(),
		});
	}

	let day_start = parse_clock("calendar.day_start", &cfg.calendar.day_start)?;
	let day_end = parse_clock("calendar.day_end", &cfg.calendar.day_end)?;

	if day_start >= day_end {
		return Err(Error::Validation {
			message: "calendar.day_start must be earlier than calendar.day_end.".to_string(),
		});
	}
	if cfg.security.bootstrap_admin_login.is_some()
		!= cfg.security.bootstrap_admin_password.is_some()
	{
		return Err(Error::Validation {
			message: "security.bootstrap_admin_login and security.bootstrap_admin_password must be set together."
				.to_string(),
		});
	}
	if cfg.qr.image_size_px < 64 {
		return Err(Error::Validation {
			message: "qr.image_size_px must be at least 64.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.http_bind = cfg.service.http_bind.trim().to_string();
	cfg.service.public_base_url = cfg.service.public_base_url.trim_end_matches('/').to_string();
	cfg.storage.blobs.public_base_url =
		cfg.storage.blobs.public_base_url.trim_end_matches('/').to_string();
	cfg.calendar.day_start = cfg.calendar.day_start.trim().to_string();
	cfg.calendar.day_end = cfg.calendar.day_end.trim().to_string();

	if cfg
		.security
		.bootstrap_admin_login
		.as_deref()
		.map(|login| login.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.bootstrap_admin_login = None;
	}
	if cfg
		.security
		.bootstrap_admin_password
		.as_deref()
		.map(|password| password.is_empty())
		.unwrap_or(false)
	{
		cfg.security.bootstrap_admin_password = None;
	}
}

/// Parses "HH:MM" (or "HH:MM:00", as Postgres renders `time`) into minutes after midnight.
pub fn clock_minutes(raw: &str) -> Option<u32> {
	let mut parts = raw.trim().split(':');
	let hours = parts.next()?;
	let minutes = parts.next()?;

	if let Some(seconds) = parts.next()
		&& seconds != "00"
	{
		return None;
	}
	if parts.next().is_some() || hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
		return None;
	}
	if !hours.bytes().chain(minutes.bytes()).all(|byte| byte.is_ascii_digit()) {
		return None;
	}

	let hours: u32 = hours.parse().ok()?;
	let minutes: u32 = minutes.parse().ok()?;

	(hours <= 23 && minutes <= 59).then_some(hours * 60 + minutes)
}

fn parse_clock(label: &str, raw: &str) -> Result<u32> {
	clock_minutes(raw)
		.ok_or_else(|| Error::Validation { message: format!("{label} must use the HH:MM format.") })
}
