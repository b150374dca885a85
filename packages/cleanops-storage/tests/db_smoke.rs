use cleanops_config::Postgres;
use cleanops_storage::db::Db;
use cleanops_testkit::TestDatabase;

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");
	db.ensure_schema().await.expect("Failed to re-run schema.");

	for table in ["accounts", "qr_codes", "live_tracking", "cleaner_workflows", "ops_visits"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "Missing table {table}.");
	}

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
