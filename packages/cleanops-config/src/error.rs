use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cannot read config file {}: {source}", path.display())]
	ReadConfig { path: PathBuf, source: std::io::Error },
	#[error("Config file {} is not valid TOML: {source}", path.display())]
	ParseConfig { path: PathBuf, source: toml::de::Error },
	#[error("Invalid config: {message}")]
	Validation { message: String },
}
