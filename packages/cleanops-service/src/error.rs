use cleanops_domain::{
	assist::TransitionError, calendar::TimeGridError, contact::PhoneError, qr::QrPayloadError,
	workflow::WorkflowError,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Blob storage error: {message}")]
	Blob { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn not_found(message: impl Into<String>) -> Self {
		Self::NotFound { message: message.into() }
	}

	pub(crate) fn conflict(message: impl Into<String>) -> Self {
		Self::Conflict { message: message.into() }
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Storage { message: format!("Stored JSON is unreadable: {err}") }
	}
}

impl From<cleanops_storage::Error> for Error {
	fn from(err: cleanops_storage::Error) -> Self {
		match err {
			cleanops_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			cleanops_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			cleanops_storage::Error::NotFound(message) => Self::NotFound { message },
			cleanops_storage::Error::Conflict(message) => Self::Conflict { message },
			cleanops_storage::Error::Blob(inner) => Self::Blob { message: inner.to_string() },
		}
	}
}

impl From<WorkflowError> for Error {
	fn from(err: WorkflowError) -> Self {
		match err {
			WorkflowError::InvalidTransition { .. } => Self::Conflict { message: err.to_string() },
			_ => Self::InvalidRequest { message: err.to_string() },
		}
	}
}

impl From<QrPayloadError> for Error {
	fn from(err: QrPayloadError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<TimeGridError> for Error {
	fn from(err: TimeGridError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<PhoneError> for Error {
	fn from(err: PhoneError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}

impl From<TransitionError> for Error {
	fn from(err: TransitionError) -> Self {
		Self::Conflict { message: err.to_string() }
	}
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
