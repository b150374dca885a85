use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use cleanops_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn sample_toml_without(section: &str) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");

	root.as_table_mut().expect("Template config must be a table.").remove(section);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("cleanops_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_message(payload: String) -> String {
	let path = write_temp_config(payload);
	let result = cleanops_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result.expect_err("Expected a validation error.").to_string()
}

#[test]
fn sample_config_loads_and_normalizes_urls() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = cleanops_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must be valid.");

	assert_eq!(cfg.storage.blobs.public_base_url, "http://127.0.0.1:8080/blobs");
	assert_eq!(cfg.calendar.slot_minutes, 15);
	assert_eq!(cfg.workflow.max_photos, 6);
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let mut payload = sample_toml_without("assist");

	payload = {
		let mut root: Value = toml::from_str(&payload).expect("Failed to parse config.");
		let table = root.as_table_mut().expect("Config must be a table.");

		table.remove("calendar");
		table.remove("qr");

		toml::to_string(&root).expect("Failed to render config.")
	};

	let path = write_temp_config(payload);
	let result = cleanops_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Config without optional sections must be valid.");

	assert_eq!(cfg.assist.escalate_after_minutes, 30);
	assert_eq!(cfg.calendar.day_start, "05:00");
	assert_eq!(cfg.qr.image_size_px, 256);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("cleanops_config_test_missing.toml");
	let err = cleanops_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err:?}");
}

#[test]
fn short_qr_signing_key_is_rejected() {
	let message = load_message(sample_toml_with(
		"security",
		"qr_signing_key",
		Value::String("short".to_string()),
	));

	assert!(
		message.contains("security.qr_signing_key must be at least 16 characters."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn min_photos_above_max_photos_is_rejected() {
	let message = load_message(sample_toml_with("workflow", "min_photos", Value::Integer(9)));

	assert!(
		message.contains("workflow.min_photos must be less than or equal to workflow.max_photos."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn slot_minutes_must_divide_an_hour() {
	let message = load_message(sample_toml_with("calendar", "slot_minutes", Value::Integer(25)));

	assert!(
		message.contains("calendar.slot_minutes must be a divisor of 60."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn day_bounds_must_be_ordered() {
	let message = load_message(sample_toml_with(
		"calendar",
		"day_start",
		Value::String("23:30".to_string()),
	));

	assert!(
		message.contains("calendar.day_start must be earlier than calendar.day_end."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn malformed_day_bound_is_rejected() {
	let message =
		load_message(sample_toml_with("calendar", "day_end", Value::String("7pm".to_string())));

	assert!(
		message.contains("calendar.day_end must use the HH:MM format."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn empty_pool_is_rejected() {
	let message =
		load_message(sample_toml_with("storage.postgres", "pool_max_conns", Value::Integer(0)));

	assert!(
		message.contains("storage.postgres.pool_max_conns must be greater than zero."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn session_ttl_must_be_positive() {
	let message =
		load_message(sample_toml_with("security", "session_ttl_hours", Value::Integer(0)));

	assert!(
		message.contains("security.session_ttl_hours must be greater than zero."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn session_ttl_is_capped_at_one_year() {
	let message =
		load_message(sample_toml_with("security", "session_ttl_hours", Value::Integer(i64::MAX)));

	assert!(
		message.contains("security.session_ttl_hours must be at most 8760."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn escalation_delay_is_capped_at_one_week() {
	let message =
		load_message(sample_toml_with("assist", "escalate_after_minutes", Value::Integer(10_081)));

	assert!(
		message.contains("assist.escalate_after_minutes must be at most 10080."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn day_bounds_accept_single_digit_hours() {
	let payload = sample_toml_with("calendar", "day_start", Value::String("7:00".to_string()));
	let path = write_temp_config(payload);
	let result = cleanops_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result.expect("Single-digit hours must be accepted.");
	assert_eq!(cleanops_config::clock_minutes("7:00"), Some(420));
	assert_eq!(cleanops_config::clock_minutes("07:00:00"), Some(420));
	assert_eq!(cleanops_config::clock_minutes("07:00:30"), None);
	assert_eq!(cleanops_config::clock_minutes("+7:00"), None);
}

#[test]
fn bootstrap_admin_needs_both_fields() {
	let message = load_message(sample_toml_with(
		"security",
		"bootstrap_admin_login",
		Value::String("owner@example.com".to_string()),
	));

	assert!(
		message.contains("must be set together."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn blank_bootstrap_fields_are_ignored() {
	let payload = sample_toml_with(
		"security",
		"bootstrap_admin_login",
		Value::String("   ".to_string()),
	);
	let path = write_temp_config(payload);
	let result = cleanops_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Blank bootstrap login must normalize away.");

	assert!(cfg.security.bootstrap_admin_login.is_none());
}
