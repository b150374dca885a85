use std::sync::LazyLock;

use argon2::{
	Argon2,
	password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{CleanOpsService, Error, Result};
use cleanops_domain::{
	contact,
	role::{Role, Session},
	routes,
};
use cleanops_storage::models::{Account, SessionRow};

const BAD_CREDENTIALS: &str = "Login or password is incorrect.";

/// Verified against when the login is unknown, so both rejections cost one argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
	LazyLock::new(|| hash_password("cleanops-unknown-login").ok());

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
	pub login: String,
	pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginResponse {
	pub token: String,
	pub account_id: Uuid,
	pub role: Role,
	pub display_name: String,
	#[serde(with = "crate::time_serde")]
	pub expires_at: OffsetDateTime,
	/// Landing page for the role.
	pub home: &'static str,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateAccountRequest {
	pub login: String,
	pub password: String,
	pub display_name: String,
	pub role: Role,
	pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateAccountResponse {
	pub account_id: Uuid,
	pub login: String,
	pub role: Role,
}

impl CleanOpsService {
	pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
		self.login_inner(req, None).await
	}

	/// Login path for the admin console; any other role is refused with the same message.
	pub async fn admin_login(&self, req: LoginRequest) -> Result<LoginResponse> {
		self.login_inner(req, Some(Role::Admin)).await
	}

	pub async fn resolve_session(&self, token: &str) -> Result<Session> {
		let token = token.trim();

		if token.is_empty() {
			return Err(unauthorized("Session token is required."));
		}

		let row: Option<SessionRow> = sqlx::query_as(
			"\
SELECT s.token_hash, s.account_id, s.role, s.display_name, s.created_at, s.expires_at
FROM sessions s
JOIN accounts a ON a.account_id = s.account_id
WHERE s.token_hash = $1 AND s.expires_at > now() AND a.is_active",
		)
		.bind(hash_token(token))
		.fetch_optional(&self.db.pool)
		.await?;
		let row = row.ok_or_else(|| unauthorized("Session is missing or expired."))?;
		let role = row.role.parse::<Role>().map_err(|err| Error::Storage { message: err.to_string() })?;

		Ok(Session { account_id: row.account_id, role, display_name: row.display_name })
	}

	pub async fn logout(&self, token: &str) -> Result<()> {
		let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
			.bind(hash_token(token.trim()))
			.execute(&self.db.pool)
			.await?;

		tracing::debug!(removed = result.rows_affected(), "Session closed.");

		Ok(())
	}

	pub async fn create_account(
		&self,
		session: &Session,
		req: CreateAccountRequest,
	) -> Result<CreateAccountResponse> {
		crate::require_exact(session, Role::Admin)?;

		self.insert_account(req).await
	}

	/// Seeds the first admin account from configuration when no admin exists yet.
	pub async fn bootstrap_admin(&self) -> Result<Option<Uuid>> {
		let (Some(login), Some(password)) = (
			self.cfg.security.bootstrap_admin_login.as_deref(),
			self.cfg.security.bootstrap_admin_password.as_deref(),
		) else {
			return Ok(None);
		};
		let existing: Option<Uuid> = sqlx::query_scalar(
			"SELECT account_id FROM accounts WHERE role = 'admin' AND is_active LIMIT 1",
		)
		.fetch_optional(&self.db.pool)
		.await?;

		if existing.is_some() {
			return Ok(None);
		}

		let created = self
			.insert_account(CreateAccountRequest {
				login: login.to_string(),
				password: password.to_string(),
				display_name: "Administrator".to_string(),
				role: Role::Admin,
				phone: None,
			})
			.await?;

		tracing::info!(account_id = %created.account_id, "Bootstrap admin account created.");

		Ok(Some(created.account_id))
	}

	pub async fn purge_expired_sessions(&self, now: OffsetDateTime) -> Result<u64> {
		let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
			.bind(now)
			.execute(&self.db.pool)
			.await?;

		Ok(result.rows_affected())
	}

	async fn login_inner(&self, req: LoginRequest, only: Option<Role>) -> Result<LoginResponse> {
		let login = req.login.trim().to_lowercase();

		if login.is_empty() || req.password.is_empty() {
			return Err(Error::invalid("login and password are required."));
		}

		let account: Option<Account> = sqlx::query_as(
			"\
SELECT account_id, role, login, display_name, phone, password_hash, is_active, created_at
FROM accounts
WHERE lower(login) = $1 AND is_active",
		)
		.bind(&login)
		.fetch_optional(&self.db.pool)
		.await?;
		let verified =
			check_password(req.password, account.as_ref().map(|account| account.password_hash.clone()))
				.await?;
		let Some(account) = account else {
			tracing::info!(login = %login, "Login rejected.");

			return Err(unauthorized(BAD_CREDENTIALS));
		};

		if !verified {
			tracing::info!(account_id = %account.account_id, "Login rejected.");

			return Err(unauthorized(BAD_CREDENTIALS));
		}

		let role =
			account.role.parse::<Role>().map_err(|err| Error::Storage { message: err.to_string() })?;

		if only.is_some_and(|required| required != role) {
			tracing::info!(account_id = %account.account_id, %role, "Privileged login rejected.");

			return Err(unauthorized(BAD_CREDENTIALS));
		}

		let now = OffsetDateTime::now_utc();
		let expires_at = now + Duration::hours(self.cfg.security.session_ttl_hours);
		let token = new_token();

		sqlx::query(
			"\
INSERT INTO sessions (token_hash, account_id, role, display_name, created_at, expires_at)
VALUES ($1, $2, $3, $4, $5, $6)",
		)
		.bind(hash_token(&token))
		.bind(account.account_id)
		.bind(role.as_str())
		.bind(&account.display_name)
		.bind(now)
		.bind(expires_at)
		.execute(&self.db.pool)
		.await?;

		tracing::info!(account_id = %account.account_id, %role, "Login succeeded.");

		Ok(LoginResponse {
			token,
			account_id: account.account_id,
			role,
			display_name: account.display_name,
			expires_at,
			home: routes::home_for(role),
		})
	}

	async fn insert_account(&self, req: CreateAccountRequest) -> Result<CreateAccountResponse> {
		let login = crate::required("login", &req.login)?.to_lowercase();
		let display_name = crate::required("display_name", &req.display_name)?;

		if login.chars().any(char::is_whitespace) {
			return Err(Error::invalid("login must not contain whitespace."));
		}

		let min_chars = self.cfg.security.min_password_chars as usize;

		if req.password.chars().count() < min_chars {
			return Err(Error::invalid(format!(
				"password must be at least {min_chars} characters."
			)));
		}

		let phone = match crate::optional(req.phone.as_deref()) {
			Some(raw) => Some(contact::normalize_phone(&raw)?),
			None => None,
		};
		let password = req.password;
		let password_hash = blocking(move || hash_password(&password)).await?;
		let account_id = Uuid::new_v4();
		let inserted = sqlx::query(
			"\
INSERT INTO accounts (account_id, role, login, display_name, phone, password_hash, is_active, created_at)
VALUES ($1, $2, $3, $4, $5, $6, true, $7)",
		)
		.bind(account_id)
		.bind(req.role.as_str())
		.bind(&login)
		.bind(&display_name)
		.bind(phone)
		.bind(password_hash)
		.bind(OffsetDateTime::now_utc())
		.execute(&self.db.pool)
		.await;

		match inserted {
			Ok(_) => {},
			Err(err) if crate::error::is_unique_violation(&err) =>
				return Err(Error::conflict(format!("Login {login:?} is already taken."))),
			Err(err) => return Err(err.into()),
		}

		tracing::info!(%account_id, role = %req.role, "Account created.");

		Ok(CreateAccountResponse { account_id, login, role: req.role })
	}
}

/// Opaque bearer token; only its hash is stored.
fn new_token() -> String {
	format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn hash_token(token: &str) -> String {
	blake3::hash(token.as_bytes()).to_hex().to_string()
}

fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);

	Argon2::default()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|err| Error::Storage { message: format!("Password hashing failed: {err}") })
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
	let parsed = PasswordHash::new(stored)
		.map_err(|err| Error::Storage { message: format!("Stored password hash is invalid: {err}") })?;

	Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Runs argon2 off the async executor. An unknown login (`stored` is `None`) is checked against
/// [`DUMMY_HASH`] and always fails.
async fn check_password(password: String, stored: Option<String>) -> Result<bool> {
	blocking(move || match stored {
		Some(stored) => verify_password(&password, &stored),
		None => {
			if let Some(dummy) = DUMMY_HASH.as_deref() {
				verify_password(&password, dummy)?;
			}

			Ok(false)
		},
	})
	.await
}

async fn blocking<T, F>(work: F) -> Result<T>
where
	T: 'static + Send,
	F: 'static + Send + FnOnce() -> Result<T>,
{
	tokio::task::spawn_blocking(work)
		.await
		.map_err(|err| Error::Storage { message: format!("Password worker failed: {err}") })?
}

fn unauthorized(message: &str) -> Error {
	Error::Unauthorized { message: message.to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokens_are_long_and_distinct() {
		let first = new_token();
		let second = new_token();

		assert_eq!(first.len(), 64);
		assert_ne!(first, second);
		assert_ne!(hash_token(&first), first);
	}

	#[test]
	fn password_hash_verifies_only_the_original() {
		let hash = hash_password("correct horse").expect("Hashing should succeed.");

		assert!(verify_password("correct horse", &hash).expect("Hash should parse."));
		assert!(!verify_password("wrong horse", &hash).expect("Hash should parse."));
	}

	#[tokio::test]
	async fn unknown_logins_are_checked_against_a_dummy_hash() {
		let dummy = DUMMY_HASH.as_deref().expect("Dummy hash should be computed.");

		assert!(PasswordHash::new(dummy).is_ok());
		assert!(
			!check_password("cleanops-unknown-login".to_string(), None)
				.await
				.expect("Dummy verification should run.")
		);

		let stored = blocking(|| hash_password("correct horse")).await.expect("Hashing should run.");

		assert!(
			check_password("correct horse".to_string(), Some(stored))
				.await
				.expect("Verification should run.")
		);
	}
}
