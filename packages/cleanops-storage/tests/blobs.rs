use cleanops_config::Blobs;
use cleanops_storage::{
	Error,
	blobs::{BlobStore, FsBlobStore},
};
use cleanops_testkit::BlobDir;

fn temp_store(max_upload_bytes: u64) -> (BlobDir, FsBlobStore) {
	let dir = BlobDir::new("blobs").expect("Failed to create blob directory.");
	let store = FsBlobStore::new(&Blobs {
		root: dir.root(),
		public_base_url: "http://127.0.0.1:8080/blobs/".to_string(),
		max_upload_bytes,
	});

	(dir, store)
}

#[tokio::test]
async fn put_then_get_returns_the_same_bytes() {
	let (_dir, store) = temp_store(1_024);

	store.put("photos/cleaner/a.jpg", b"jpeg-bytes").await.expect("Failed to store blob.");

	let bytes = store.get("photos/cleaner/a.jpg").await.expect("Failed to read blob.");

	assert_eq!(bytes, b"jpeg-bytes");
	assert_eq!(
		store.public_url("photos/cleaner/a.jpg"),
		"http://127.0.0.1:8080/blobs/photos/cleaner/a.jpg"
	);
}

#[tokio::test]
async fn oversize_and_escaping_writes_are_rejected() {
	let (_dir, store) = temp_store(4);
	let err = store.put("photos/a.jpg", b"too large").await.expect_err("Expected size error.");

	assert!(matches!(err, Error::InvalidArgument(_)), "Unexpected error: {err:?}");

	let err = store.put("../a.jpg", b"ok").await.expect_err("Expected key error.");

	assert!(matches!(err, Error::InvalidArgument(_)), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn keys_are_write_once() {
	let (_dir, store) = temp_store(1_024);

	store.put("qr/code.svg", b"<svg/>").await.expect("Failed to store blob.");

	let err = store.put("qr/code.svg", b"<svg/>").await.expect_err("Expected conflict.");

	assert!(matches!(err, Error::Conflict(_)), "Unexpected error: {err:?}");
	assert_eq!(store.get("qr/code.svg").await.expect("Failed to read blob."), b"<svg/>");
}

#[tokio::test]
async fn missing_blob_is_not_found() {
	let (_dir, store) = temp_store(4);
	let err = store.get("qr/missing.svg").await.expect_err("Expected not found.");

	assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn deleted_keys_can_be_stored_again() {
	let (_dir, store) = temp_store(1_024);

	store.put("qr/code.svg", b"<svg/>").await.expect("Failed to store blob.");
	store.delete("qr/code.svg").await.expect("Failed to delete blob.");

	let err = store.get("qr/code.svg").await.expect_err("Expected not found.");

	assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err:?}");

	store.delete("qr/code.svg").await.expect("Deleting a missing blob should succeed.");
	store.put("qr/code.svg", b"<svg></svg>").await.expect("Failed to store blob again.");

	assert_eq!(store.get("qr/code.svg").await.expect("Failed to read blob."), b"<svg></svg>");
}
