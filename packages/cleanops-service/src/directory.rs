use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{CleanOpsService, Error, Op, Result};
use cleanops_domain::{
	contact,
	role::{Role, Session},
};
use cleanops_storage::models::{Account, Customer, Site};

#[derive(Clone, Debug, Deserialize)]
pub struct CreateCustomerRequest {
	pub name: String,
	pub contact_email: Option<String>,
	pub contact_phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CustomerItem {
	pub customer_id: Uuid,
	pub name: String,
	pub contact_email: Option<String>,
	pub contact_phone: Option<String>,
	/// Phone formatted for display; absent when none is on file.
	pub contact_phone_display: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Customer> for CustomerItem {
	fn from(row: Customer) -> Self {
		let contact_phone_display =
			row.contact_phone.as_deref().and_then(|phone| contact::format_phone(phone).ok());

		Self {
			customer_id: row.customer_id,
			name: row.name,
			contact_email: row.contact_email,
			contact_phone: row.contact_phone,
			contact_phone_display,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateSiteRequest {
	pub customer_id: Uuid,
	pub name: String,
	pub address: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SiteItem {
	pub site_id: Uuid,
	pub customer_id: Uuid,
	pub name: String,
	pub address: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<Site> for SiteItem {
	fn from(row: Site) -> Self {
		Self {
			site_id: row.site_id,
			customer_id: row.customer_id,
			name: row.name,
			address: row.address,
			created_at: row.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct CleanerItem {
	pub account_id: Uuid,
	pub login: String,
	pub display_name: String,
	pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeactivateResponse {
	pub id: Uuid,
	pub op: Op,
}

impl CleanOpsService {
	pub async fn create_customer(
		&self,
		session: &Session,
		req: CreateCustomerRequest,
	) -> Result<CustomerItem> {
		crate::require_at_least(session, Role::Manager)?;

		let name = crate::required("name", &req.name)?;
		let contact_email = crate::optional(req.contact_email.as_deref());

		if let Some(email) = &contact_email
			&& !contact::is_valid_email(email)
		{
			return Err(Error::invalid("contact_email is not a valid email address."));
		}

		let contact_phone = match crate::optional(req.contact_phone.as_deref()) {
			Some(raw) => Some(contact::normalize_phone(&raw)?),
			None => None,
		};
		let row: Customer = sqlx::query_as(
			"\
INSERT INTO customers (customer_id, name, contact_email, contact_phone, is_active, created_at)
VALUES ($1, $2, $3, $4, true, $5)
RETURNING customer_id, name, contact_email, contact_phone, is_active, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(name)
		.bind(contact_email)
		.bind(contact_phone)
		.bind(OffsetDateTime::now_utc())
		.fetch_one(&self.db.pool)
		.await?;

		tracing::info!(customer_id = %row.customer_id, "Customer created.");

		Ok(row.into())
	}

	pub async fn list_customers(&self, session: &Session) -> Result<Vec<CustomerItem>> {
		crate::require_at_least(session, Role::Manager)?;

		let rows: Vec<Customer> = sqlx::query_as(
			"\
SELECT customer_id, name, contact_email, contact_phone, is_active, created_at
FROM customers
WHERE is_active
ORDER BY name ASC",
		)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows.into_iter().map(CustomerItem::from).collect())
	}

	pub async fn create_site(&self, session: &Session, req: CreateSiteRequest) -> Result<SiteItem> {
		crate::require_at_least(session, Role::Manager)?;

		let name = crate::required("name", &req.name)?;
		let customer_exists: bool = sqlx::query_scalar(
			"SELECT EXISTS (SELECT 1 FROM customers WHERE customer_id = $1 AND is_active)",
		)
		.bind(req.customer_id)
		.fetch_one(&self.db.pool)
		.await?;

		if !customer_exists {
			return Err(Error::not_found("Customer not found."));
		}

		let row: Site = sqlx::query_as(
			"\
INSERT INTO sites (site_id, customer_id, name, address, is_active, created_at)
VALUES ($1, $2, $3, $4, true, $5)
RETURNING site_id, customer_id, name, address, is_active, created_at",
		)
		.bind(Uuid::new_v4())
		.bind(req.customer_id)
		.bind(name)
		.bind(crate::optional(req.address.as_deref()))
		.bind(OffsetDateTime::now_utc())
		.fetch_one(&self.db.pool)
		.await?;

		tracing::info!(site_id = %row.site_id, customer_id = %row.customer_id, "Site created.");

		Ok(row.into())
	}

	/// Active sites, optionally narrowed to one customer. Any signed-in role may read them.
	pub async fn list_sites(&self, customer_id: Option<Uuid>) -> Result<Vec<SiteItem>> {
		let rows: Vec<Site> = sqlx::query_as(
			"\
SELECT site_id, customer_id, name, address, is_active, created_at
FROM sites
WHERE is_active AND ($1::uuid IS NULL OR customer_id = $1)
ORDER BY name ASC",
		)
		.bind(customer_id)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows.into_iter().map(SiteItem::from).collect())
	}

	pub async fn deactivate_site(&self, session: &Session, site_id: Uuid) -> Result<DeactivateResponse> {
		crate::require_at_least(session, Role::Manager)?;

		let op = self.soft_delete("sites", "site_id", site_id).await?;

		tracing::info!(%site_id, ?op, "Site deactivated.");

		Ok(DeactivateResponse { id: site_id, op })
	}

	pub async fn list_cleaners(&self, session: &Session) -> Result<Vec<CleanerItem>> {
		crate::require_at_least(session, Role::Manager)?;

		let rows: Vec<Account> = sqlx::query_as(
			"\
SELECT account_id, role, login, display_name, phone, password_hash, is_active, created_at
FROM accounts
WHERE role = 'cleaner' AND is_active
ORDER BY display_name ASC",
		)
		.fetch_all(&self.db.pool)
		.await?;

		Ok(rows
			.into_iter()
			.map(|row| CleanerItem {
				account_id: row.account_id,
				login: row.login,
				display_name: row.display_name,
				phone: row.phone,
			})
			.collect())
	}

	pub async fn deactivate_account(
		&self,
		session: &Session,
		account_id: Uuid,
	) -> Result<DeactivateResponse> {
		crate::require_exact(session, Role::Admin)?;

		if account_id == session.account_id {
			return Err(Error::invalid("Admins cannot deactivate their own account."));
		}

		let mut tx = self.db.pool.begin().await?;
		let active: Option<bool> =
			sqlx::query_scalar("SELECT is_active FROM accounts WHERE account_id = $1 FOR UPDATE")
				.bind(account_id)
				.fetch_optional(&mut *tx)
				.await?;
		let op = match active {
			None => return Err(Error::not_found("Account not found.")),
			Some(false) => Op::None,
			Some(true) => {
				sqlx::query("UPDATE accounts SET is_active = false WHERE account_id = $1")
					.bind(account_id)
					.execute(&mut *tx)
					.await?;
				sqlx::query("DELETE FROM sessions WHERE account_id = $1")
					.bind(account_id)
					.execute(&mut *tx)
					.await?;

				Op::Delete
			},
		};

		tx.commit().await?;

		tracing::info!(%account_id, ?op, "Account deactivated.");

		Ok(DeactivateResponse { id: account_id, op })
	}

	/// Flips `is_active` off for one row. The table and column come from fixed call sites only.
	pub(crate) async fn soft_delete(&self, table: &str, id_column: &str, id: Uuid) -> Result<Op> {
		let mut tx = self.db.pool.begin().await?;
		let active: Option<bool> = sqlx::query_scalar(&format!(
			"SELECT is_active FROM {table} WHERE {id_column} = $1 FOR UPDATE"
		))
		.bind(id)
		.fetch_optional(&mut *tx)
		.await?;
		let op = match active {
			None => return Err(Error::not_found(format!("No row in {table} matches {id}."))),
			Some(false) => Op::None,
			Some(true) => {
				sqlx::query(&format!("UPDATE {table} SET is_active = false WHERE {id_column} = $1"))
					.bind(id)
					.execute(&mut *tx)
					.await?;

				Op::Delete
			},
		};

		tx.commit().await?;

		Ok(op)
	}
}
