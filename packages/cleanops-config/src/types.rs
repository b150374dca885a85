use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub security: Security,
	#[serde(default)]
	pub workflow: Workflow,
	#[serde(default)]
	pub assist: Assist,
	#[serde(default)]
	pub calendar: Calendar,
	#[serde(default)]
	pub qr: Qr,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Base URL the dashboard is reachable at, used when building absolute links.
	pub public_base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub blobs: Blobs,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Blobs {
	/// Directory photos and QR images are written under.
	pub root: String,
	/// URL prefix that maps onto `root`, e.g. "http://127.0.0.1:8080/blobs".
	pub public_base_url: String,
	#[serde(default = "default_max_upload_bytes")]
	pub max_upload_bytes: u64,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub session_ttl_hours: i64,
	/// Secret mixed into every QR payload signature. Rotating it invalidates printed codes.
	pub qr_signing_key: String,
	#[serde(default = "default_min_password_chars")]
	pub min_password_chars: u32,
	/// Optional. Creates this admin at startup when no admin account exists yet.
	pub bootstrap_admin_login: Option<String>,
	pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Workflow {
	pub min_photos: u32,
	pub max_photos: u32,
	pub require_all_tasks: bool,
}
impl Default for Workflow {
	fn default() -> Self {
		Self { min_photos: 1, max_photos: 6, require_all_tasks: true }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Assist {
	pub escalate_after_minutes: i64,
	pub sweep_interval_secs: u64,
}
impl Default for Assist {
	fn default() -> Self {
		Self { escalate_after_minutes: 30, sweep_interval_secs: 60 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Calendar {
	pub slot_minutes: u32,
	pub day_start: String,
	pub day_end: String,
}
impl Default for Calendar {
	fn default() -> Self {
		Self { slot_minutes: 15, day_start: "05:00".to_string(), day_end: "23:00".to_string() }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Qr {
	pub image_size_px: u32,
}
impl Default for Qr {
	fn default() -> Self {
		Self { image_size_px: 256 }
	}
}

fn default_max_upload_bytes() -> u64 {
	8 * 1_024 * 1_024
}

fn default_min_password_chars() -> u32 {
	8
}
