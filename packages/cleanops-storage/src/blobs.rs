//! Blob storage for uploaded photos and rendered QR images.

use std::{
	future::Future,
	path::{Component, Path, PathBuf},
	pin::Pin,
};

use tokio::{
	fs::{self, OpenOptions},
	io::AsyncWriteExt,
};

use crate::{Error, Result};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait BlobStore
where
	Self: Send + Sync,
{
	fn put<'a>(&'a self, key: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<()>>;

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;

	/// Removing a key that was never stored succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

	fn public_url(&self, key: &str) -> String;
}

pub struct FsBlobStore {
	root: PathBuf,
	public_base_url: String,
	max_bytes: u64,
}
impl FsBlobStore {
	pub fn new(cfg: &cleanops_config::Blobs) -> Self {
		Self {
			root: PathBuf::from(&cfg.root),
			public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
			max_bytes: cfg.max_upload_bytes,
		}
	}

	fn resolve(&self, key: &str) -> Result<PathBuf> {
		validate_key(key)?;

		Ok(self.root.join(key))
	}

	async fn put_inner(&self, key: &str, bytes: &[u8]) -> Result<()> {
		if bytes.len() as u64 > self.max_bytes {
			return Err(Error::InvalidArgument(format!(
				"Blob exceeds the {} byte upload limit.",
				self.max_bytes
			)));
		}

		let path = self.resolve(key)?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}

		// Keys are write-once; a second put under the same key is refused.
		let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
			Ok(file) => file,
			Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists =>
				return Err(Error::Conflict(format!("Blob {key:?} already exists."))),
			Err(err) => return Err(err.into()),
		};

		file.write_all(bytes).await?;
		file.flush().await?;

		tracing::debug!(key, bytes = bytes.len(), "Blob stored.");

		Ok(())
	}

	async fn get_inner(&self, key: &str) -> Result<Vec<u8>> {
		let path = self.resolve(key)?;

		match fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound =>
				Err(Error::NotFound(format!("Blob {key:?} does not exist."))),
			Err(err) => Err(err.into()),
		}
	}

	async fn delete_inner(&self, key: &str) -> Result<()> {
		let path = self.resolve(key)?;

		match fs::remove_file(&path).await {
			Ok(()) => {
				tracing::debug!(key, "Blob removed.");

				Ok(())
			},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(err.into()),
		}
	}
}
impl BlobStore for FsBlobStore {
	fn put<'a>(&'a self, key: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.put_inner(key, bytes))
	}

	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
		Box::pin(self.get_inner(key))
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_inner(key))
	}

	fn public_url(&self, key: &str) -> String {
		format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
	}
}

/// Keys are relative, slash-separated paths made of plain segments.
pub fn validate_key(key: &str) -> Result<()> {
	let invalid = || Error::InvalidArgument(format!("Blob key {key:?} is not a relative path."));

	if key.is_empty() || key.contains('\\') {
		return Err(invalid());
	}

	let path = Path::new(key);

	if path.components().all(|component| matches!(component, Component::Normal(_))) {
		Ok(())
	} else {
		Err(invalid())
	}
}

#[cfg(test)]
mod tests {
	use super::validate_key;

	#[test]
	fn keys_cannot_escape_the_root() {
		assert!(validate_key("photos/2024/06/a.jpg").is_ok());
		assert!(validate_key("../etc/passwd").is_err());
		assert!(validate_key("/etc/passwd").is_err());
		assert!(validate_key("").is_err());
	}
}
