//! Contact detail normalization for accounts and customers.

use std::sync::LazyLock;

use regex::Regex;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s.]{2,}$";

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum PhoneError {
	#[error("Phone number must have 10 digits, or 11 digits starting with 1.")]
	InvalidLength,
	#[error("Phone number has an invalid area code or exchange.")]
	InvalidNumber,
}

/// Formats a North American number for display: `(555) 123-4567` or `+1 (555) 123-4567`.
pub fn format_phone(raw: &str) -> Result<String, PhoneError> {
	let (country, national) = split(raw)?;
	let (area, exchange, line) = (&national[..3], &national[3..6], &national[6..]);

	if country {
		Ok(format!("+1 ({area}) {exchange}-{line}"))
	} else {
		Ok(format!("({area}) {exchange}-{line}"))
	}
}

/// Canonical storage form: `+1AAABBBCCCC`.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
	let (_, national) = split(raw)?;

	Ok(format!("+1{national}"))
}

fn split(raw: &str) -> Result<(bool, String), PhoneError> {
	let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
	let (country, national) = match digits.len() {
		10 => (false, digits),
		11 if digits.starts_with('1') => (true, digits[1..].to_string()),
		_ => return Err(PhoneError::InvalidLength),
	};

	// NANP area codes and exchanges never start with 0 or 1.
	if national.starts_with(['0', '1']) || national[3..].starts_with(['0', '1']) {
		return Err(PhoneError::InvalidNumber);
	}

	Ok((country, national))
}

pub fn is_valid_email(raw: &str) -> bool {
	EMAIL.as_ref().is_some_and(|re| re.is_match(raw.trim()))
}
