use qrcode::{QrCode as QrMatrix, render::svg};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{CleanOpsService, Error, Op, Result};
use cleanops_domain::{
	qr::{QrKind, QrPayload},
	qr_library::{self, QrLibraryEntry},
	role::{Role, Session},
};
use cleanops_storage::models::{QrCode, QrCodeListing};

#[derive(Clone, Debug, Deserialize)]
pub struct GenerateQrRequest {
	pub kind: QrKind,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub label: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct QrCodeResponse {
	pub qr_code_id: Uuid,
	pub kind: QrKind,
	pub customer_id: Uuid,
	pub site_id: Uuid,
	pub area_id: Option<Uuid>,
	pub label: String,
	pub payload: String,
	pub image_url: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQrRequest {
	pub customer_id: Option<Uuid>,
	#[serde(default)]
	pub search: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct QrDeleteResponse {
	pub qr_code_id: Uuid,
	pub op: Op,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanResult {
	pub payload: QrPayload,
	pub label: String,
	pub customer_id: Uuid,
}

impl CleanOpsService {
	pub async fn generate_qr(
		&self,
		session: &Session,
		req: GenerateQrRequest,
	) -> Result<QrCodeResponse> {
		crate::require_at_least(session, Role::Manager)?;

		let label = crate::required("label", &req.label)?;
		let customer_id: Option<Uuid> = sqlx::query_scalar(
			"SELECT customer_id FROM sites WHERE site_id = $1 AND is_active",
		)
		.bind(req.site_id)
		.fetch_optional(&self.db.pool)
		.await?;
		let customer_id = customer_id.ok_or_else(|| Error::not_found("Site not found."))?;

		if let Some(area_id) = req.area_id {
			let in_site: bool = sqlx::query_scalar(
				"SELECT EXISTS (SELECT 1 FROM areas WHERE area_id = $1 AND site_id = $2 AND is_active)",
			)
			.bind(area_id)
			.bind(req.site_id)
			.fetch_one(&self.db.pool)
			.await?;

			if !in_site {
				return Err(Error::not_found("Area not found at this site."));
			}
		}

		let qr_code_id = Uuid::new_v4();
		let payload = self.signer.encode(&QrPayload {
			kind: req.kind,
			code_id: qr_code_id,
			site_id: req.site_id,
			area_id: req.area_id,
		})?;
		let image = render_svg(&payload, self.cfg.qr.image_size_px)?;
		let image_path = format!("qr/{qr_code_id}.svg");

		self.blobs.put(&image_path, image.as_bytes()).await?;

		let row = sqlx::query_as::<_, QrCode>(
			"\
INSERT INTO qr_codes (
	qr_code_id,
	customer_id,
	site_id,
	area_id,
	kind,
	label,
	payload,
	image_path,
	is_active,
	created_by,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $10)
RETURNING *",
		)
		.bind(qr_code_id)
		.bind(customer_id)
		.bind(req.site_id)
		.bind(req.area_id)
		.bind(req.kind.as_str())
		.bind(label)
		.bind(&payload)
		.bind(&image_path)
		.bind(session.account_id)
		.bind(OffsetDateTime::now_utc())
		.fetch_one(&self.db.pool)
		.await;
		let row = match row {
			Ok(row) => row,
			Err(err) => {
				self.discard_blob(&image_path).await;

				return Err(err.into());
			},
		};

		tracing::info!(%qr_code_id, kind = %req.kind, site_id = %req.site_id, "QR code generated.");

		Ok(QrCodeResponse {
			qr_code_id: row.qr_code_id,
			kind: req.kind,
			customer_id: row.customer_id,
			site_id: row.site_id,
			area_id: row.area_id,
			label: row.label,
			payload: row.payload,
			image_url: self.blobs.public_url(&row.image_path),
			created_at: row.created_at,
		})
	}

	pub async fn list_qr_codes(
		&self,
		session: &Session,
		req: ListQrRequest,
	) -> Result<Vec<QrLibraryEntry>> {
		crate::require_at_least(session, Role::Manager)?;

		let rows: Vec<QrCodeListing> = sqlx::query_as(
			"\
SELECT
	q.qr_code_id,
	q.customer_id,
	c.name AS customer_name,
	q.site_id,
	s.name AS site_name,
	q.area_id,
	a.name AS area_name,
	q.kind,
	q.label,
	q.payload,
	q.image_path,
	q.is_active,
	q.created_at
FROM qr_codes q
JOIN customers c ON c.customer_id = q.customer_id
JOIN sites s ON s.site_id = q.site_id
LEFT JOIN areas a ON a.area_id = q.area_id
WHERE q.is_active AND ($1::uuid IS NULL OR q.customer_id = $1)
ORDER BY q.created_at DESC, q.qr_code_id ASC",
		)
		.bind(req.customer_id)
		.fetch_all(&self.db.pool)
		.await?;
		let entries = rows
			.into_iter()
			.map(|row| self.library_entry(row))
			.collect::<Result<Vec<_>>>()?;

		Ok(qr_library::filter(entries, req.customer_id, &req.search))
	}

	pub async fn delete_qr(&self, session: &Session, qr_code_id: Uuid) -> Result<QrDeleteResponse> {
		crate::require_at_least(session, Role::Manager)?;

		let op = self.soft_delete("qr_codes", "qr_code_id", qr_code_id).await?;

		tracing::info!(%qr_code_id, ?op, "QR code deactivated.");

		Ok(QrDeleteResponse { qr_code_id, op })
	}

	/// Verifies scanned text and returns the payload if its code is still active.
	pub async fn resolve_scan(&self, scanned: &str) -> Result<ScanResult> {
		let payload = self.signer.decode(scanned)?;
		let row: Option<QrCode> = sqlx::query_as("SELECT * FROM qr_codes WHERE qr_code_id = $1")
			.bind(payload.code_id)
			.fetch_optional(&self.db.pool)
			.await?;
		let row = row.ok_or_else(|| Error::not_found("QR code is not registered."))?;

		if !row.is_active {
			return Err(Error::invalid("QR code has been deactivated."));
		}
		if row.site_id != payload.site_id || row.area_id != payload.area_id {
			return Err(Error::invalid("QR code does not match its registration."));
		}

		Ok(ScanResult { payload, label: row.label, customer_id: row.customer_id })
	}

	fn library_entry(&self, row: QrCodeListing) -> Result<QrLibraryEntry> {
		let kind = row.kind.parse::<QrKind>()?;

		Ok(QrLibraryEntry {
			id: row.qr_code_id,
			kind,
			label: row.label,
			customer_id: row.customer_id,
			customer_name: row.customer_name,
			site_id: row.site_id,
			site_name: row.site_name,
			area_id: row.area_id,
			area_name: row.area_name,
			payload: row.payload,
			image_url: self.blobs.public_url(&row.image_path),
			is_active: row.is_active,
			created_at: row.created_at,
		})
	}
}

fn render_svg(payload: &str, size_px: u32) -> Result<String> {
	let matrix = QrMatrix::new(payload.as_bytes())
		.map_err(|err| Error::invalid(format!("Payload cannot be encoded as a QR code: {err}")))?;

	Ok(matrix
		.render::<svg::Color<'_>>()
		.min_dimensions(size_px, size_px)
		.quiet_zone(true)
		.build())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn payload_renders_as_svg() {
		let svg = render_svg("cleanops:1:clock:a:b:-:0123456789abcdef", 256)
			.expect("Payload should encode.");

		assert!(svg.contains("<svg"));
	}
}
