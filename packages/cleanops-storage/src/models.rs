use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Account {
	pub account_id: Uuid,
	pub role: String,
	pub login: String,
	pub display_name: String,
	pub phone: Option<String>,
	pub password_hash: String,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionRow {
	pub token_hash: String,
	pub account_id: Uuid,
	pub role: String,
	pub display_name: String,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Customer {
	pub customer_id: Uuid,
	pub name: String,
	pub contact_email: Option<String>,
	pub contact_phone: Option<String>,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Site {
	pub site_id: Uuid,
	pub customer_id: Uuid,
	pub name: String,
	pub address: Option<String>,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Area {
	pub area_id: Uuid,
	pub site_id: Uuid,
	pub name: String,
	pub description: Option<String>,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AreaTask {
	pub task_id: Uuid,
	pub area_id: Uuid,
	pub title: String,
	pub sort_order: i32,
	pub requires_photo: bool,
	pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct QrCode {
	pub qr_code_id: Uuid,
	pub customer_id: Uuid,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub kind: String,
	pub label: String,
	pub payload: String,
	pub image_path: String,
	pub is_active: bool,
	pub created_by: Uuid,
	pub created_at: OffsetDateTime,
}

/// A QR code joined with the names the library displays.
#[derive(Debug, sqlx::FromRow)]
pub struct QrCodeListing {
	pub qr_code_id: Uuid,
	pub customer_id: Uuid,
	pub customer_name: String,
	pub site_id: Uuid,
	pub site_name: String,
	pub area_id: Option<Uuid>,
	pub area_name: Option<String>,
	pub kind: String,
	pub label: String,
	pub payload: String,
	pub image_path: String,
	pub is_active: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrackingEvent {
	pub event_id: Uuid,
	pub cleaner_id: Uuid,
	pub cleaner_name: String,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub qr_code_id: Uuid,
	pub event: String,
	pub at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CleanerWorkflow {
	pub cleaner_id: Uuid,
	pub state: Value,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CleanerLog {
	pub log_id: Uuid,
	pub cleaner_id: Uuid,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub task_ids: Vec<Uuid>,
	pub photo_paths: Vec<String>,
	pub notes: Option<String>,
	pub clock_in_at: OffsetDateTime,
	pub clock_out_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AssistRequest {
	pub request_id: Uuid,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub description: String,
	pub reported_by: Uuid,
	pub status: String,
	pub assigned_cleaner_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
