use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::qr::QrKind;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QrLibraryEntry {
	pub id: Uuid,
	pub kind: QrKind,
	pub label: String,
	pub customer_id: Uuid,
	pub customer_name: String,
	pub site_id: Uuid,
	pub site_name: String,
	pub area_id: Option<Uuid>,
	pub area_name: Option<String>,
	pub payload: String,
	pub image_url: String,
	pub is_active: bool,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl QrLibraryEntry {
	fn haystack(&self) -> String {
		let mut text = format!("{} {} {}", self.label, self.customer_name, self.site_name);

		if let Some(area) = &self.area_name {
			text.push(' ');
			text.push_str(area);
		}

		text.to_lowercase()
	}
}

/// Narrows the library to active rows for `customer_id` (when given) that contain every search term.
pub fn filter(
	rows: impl IntoIterator<Item = QrLibraryEntry>,
	customer_id: Option<Uuid>,
	search: &str,
) -> Vec<QrLibraryEntry> {
	let terms: Vec<String> = search.split_whitespace().map(str::to_lowercase).collect();

	rows.into_iter()
		.filter(|row| row.is_active)
		.filter(|row| customer_id.is_none_or(|id| row.customer_id == id))
		.filter(|row| {
			if terms.is_empty() {
				return true;
			}

			let haystack = row.haystack();

			terms.iter().all(|term| haystack.contains(term.as_str()))
		})
		.collect()
}
