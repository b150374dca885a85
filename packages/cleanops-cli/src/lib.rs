//! Shared command-line surface for the CleanOps binaries.

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

/// Log level used when `service.log_level` is not a valid filter directive.
pub const FALLBACK_LOG_LEVEL: &str = "info";

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Blue.on_default() | Effects::BOLD)
		.usage(AnsiColor::Blue.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// Installs the global fmt subscriber; call once per process.
pub fn init_tracing(log_level: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
