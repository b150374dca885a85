use std::{path::Path, sync::Arc};

use cleanops_config::{
	Assist, Blobs, Calendar, Config, Postgres, Qr, Security, Service, Storage, Workflow,
};
use cleanops_domain::{
	assist::AssistStatus,
	calendar::DragMode,
	qr::QrKind,
	role::{Role, Session},
};
use cleanops_service::{
	AssistRequestInput, CleanOpsService, ClockInRequest, ClockOutRequest, CreateAccountRequest,
	CreateAreaRequest, CreateAreaResponse, CreateCustomerRequest, CreateSiteRequest,
	CreateVisitRequest, Error, GenerateQrRequest, ListQrRequest, LoginRequest, Op,
	PhotoUploadRequest, QrCodeResponse, TaskCompletionRequest, TaskInput, VisitTimeChange,
};
use cleanops_storage::{blobs::FsBlobStore, db::Db};
use cleanops_testkit::{BlobDir, TestDatabase};
use time::{OffsetDateTime, macros::date};
use uuid::Uuid;

const ADMIN_LOGIN: &str = "admin";
const ADMIN_PASSWORD: &str = "admin-password";

fn test_config(dsn: &str, blob_root: &Path) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
			public_base_url: "http://127.0.0.1:8080".to_string(),
		},
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 4 },
			blobs: Blobs {
				root: blob_root.to_string_lossy().into_owned(),
				public_base_url: "http://127.0.0.1:8080/blobs".to_string(),
				max_upload_bytes: 1_024 * 1_024,
			},
		},
		security: Security {
			bind_localhost_only: true,
			session_ttl_hours: 1,
			qr_signing_key: "integration-test-signing-key".to_string(),
			min_password_chars: 8,
			bootstrap_admin_login: Some(ADMIN_LOGIN.to_string()),
			bootstrap_admin_password: Some(ADMIN_PASSWORD.to_string()),
		},
		workflow: Workflow::default(),
		assist: Assist::default(),
		calendar: Calendar::default(),
		qr: Qr::default(),
	}
}

async fn build_service(test_db: &TestDatabase, blob_root: &Path) -> CleanOpsService {
	let cfg = test_config(test_db.dsn(), blob_root);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let blobs = Arc::new(FsBlobStore::new(&cfg.storage.blobs));

	CleanOpsService::new(cfg, db, blobs).expect("Failed to build service.")
}

async fn sign_in(service: &CleanOpsService, login: &str, password: &str) -> Session {
	let response = service
		.login(LoginRequest { login: login.to_string(), password: password.to_string() })
		.await
		.expect("Login should succeed.");

	service.resolve_session(&response.token).await.expect("Fresh session should resolve.")
}

struct Fixture {
	site_id: Uuid,
	customer_id: Uuid,
	cleaner_login: String,
}

async fn seed(service: &CleanOpsService) -> Fixture {
	service.bootstrap_admin().await.expect("Bootstrap admin should be created.");

	let admin = sign_in(service, ADMIN_LOGIN, ADMIN_PASSWORD).await;

	for (login, role) in [
		("manager1", Role::Manager),
		("ops1", Role::OpsManager),
		("cleaner1", Role::Cleaner),
	] {
		service
			.create_account(
				&admin,
				CreateAccountRequest {
					login: login.to_string(),
					password: "password-123".to_string(),
					display_name: login.to_string(),
					role,
					phone: None,
				},
			)
			.await
			.expect("Account should be created.");
	}

	let manager = sign_in(service, "manager1", "password-123").await;
	let customer = service
		.create_customer(
			&manager,
			CreateCustomerRequest {
				name: "Acme Offices".to_string(),
				contact_email: Some("ops@acme.example".to_string()),
				contact_phone: Some("555-210-0199".to_string()),
			},
		)
		.await
		.expect("Customer should be created.");
	let site = service
		.create_site(
			&manager,
			CreateSiteRequest {
				customer_id: customer.customer_id,
				name: "Acme HQ".to_string(),
				address: None,
			},
		)
		.await
		.expect("Site should be created.");

	Fixture {
		site_id: site.site_id,
		customer_id: customer.customer_id,
		cleaner_login: "cleaner1".to_string(),
	}
}

async fn area_with_code(
	service: &CleanOpsService,
	manager: &Session,
	site_id: Uuid,
	tasks: &[&str],
) -> (CreateAreaResponse, QrCodeResponse) {
	let area = service
		.create_area(
			manager,
			CreateAreaRequest {
				site_id,
				name: "Washrooms".to_string(),
				description: None,
				tasks: tasks
					.iter()
					.map(|title| TaskInput { title: title.to_string(), requires_photo: false })
					.collect(),
			},
		)
		.await
		.expect("Area should be created.");
	let code = service
		.generate_qr(
			manager,
			GenerateQrRequest {
				kind: QrKind::Area,
				site_id,
				area_id: Some(area.area.area_id),
				label: "Washroom door".to_string(),
			},
		)
		.await
		.expect("QR code should be generated.");

	(area, code)
}

async fn count(service: &CleanOpsService, sql: &str, id: Uuid) -> i64 {
	sqlx::query_scalar(sql).bind(id).fetch_one(&service.db.pool).await.expect("Count should run.")
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn clock_in_state_survives_reload() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping clock_in_state_survives_reload; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let manager = sign_in(&service, "manager1", "password-123").await;
	let area = service
		.create_area(
			&manager,
			CreateAreaRequest {
				site_id: fixture.site_id,
				name: "Lobby".to_string(),
				description: None,
				tasks: vec![
					TaskInput { title: "Mop floor".to_string(), requires_photo: false },
					TaskInput { title: "Empty bins".to_string(), requires_photo: false },
				],
			},
		)
		.await
		.expect("Area should be created.");
	let code = service
		.generate_qr(
			&manager,
			GenerateQrRequest {
				kind: QrKind::Area,
				site_id: fixture.site_id,
				area_id: Some(area.area.area_id),
				label: "Lobby door".to_string(),
			},
		)
		.await
		.expect("QR code should be generated.");
	let cleaner = sign_in(&service, &fixture.cleaner_login, "password-123").await;
	let before = service.workflow(&cleaner).await.expect("Workflow should load.");

	assert_eq!(before.stage, "clock_in");

	let after = service
		.clock_in(&cleaner, ClockInRequest { scanned: code.payload.clone() })
		.await
		.expect("Clock-in should succeed.");

	assert_eq!(after.stage, "workflow");
	assert_eq!(after.step, "checklist");
	assert_eq!(after.checklist.len(), 2);

	let again = service.clock_in(&cleaner, ClockInRequest { scanned: code.payload.clone() }).await;

	assert!(matches!(again, Err(Error::Conflict { .. })));

	service.db.pool.close().await;

	let reloaded = build_service(&test_db, blobs.path()).await;
	let restored = reloaded.workflow(&cleaner).await.expect("Workflow should reload.");

	assert_eq!(restored.stage, "workflow");
	assert_eq!(restored.step, "checklist");
	assert_eq!(restored.state, after.state);

	reloaded.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn deleting_a_qr_code_hides_only_that_code() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!(
			"Skipping deleting_a_qr_code_hides_only_that_code; set CLEANOPS_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let manager = sign_in(&service, "manager1", "password-123").await;
	let mut ids = Vec::new();

	for label in ["Front entrance", "Loading dock"] {
		let code = service
			.generate_qr(
				&manager,
				GenerateQrRequest {
					kind: QrKind::Clock,
					site_id: fixture.site_id,
					area_id: None,
					label: label.to_string(),
				},
			)
			.await
			.expect("QR code should be generated.");

		ids.push(code.qr_code_id);
	}

	let deleted = service.delete_qr(&manager, ids[0]).await.expect("Delete should succeed.");

	assert_eq!(deleted.op, Op::Delete);

	let repeat = service.delete_qr(&manager, ids[0]).await.expect("Repeat delete should succeed.");

	assert_eq!(repeat.op, Op::None);

	let listed = service
		.list_qr_codes(
			&manager,
			ListQrRequest { customer_id: Some(fixture.customer_id), search: String::new() },
		)
		.await
		.expect("Library should list.");
	let listed_ids: Vec<Uuid> = listed.iter().map(|entry| entry.id).collect();

	assert_eq!(listed_ids, vec![ids[1]]);

	let active: bool = sqlx::query_scalar("SELECT is_active FROM qr_codes WHERE qr_code_id = $1")
		.bind(ids[0])
		.fetch_one(&service.db.pool)
		.await
		.expect("Deleted row should still exist.");

	assert!(!active);

	let scan = service.resolve_scan(&listed[0].payload).await.expect("Active code should scan.");

	assert_eq!(scan.payload.code_id, ids[1]);

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn wrong_password_and_wrong_role_share_one_message() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!(
			"Skipping wrong_password_and_wrong_role_share_one_message; set CLEANOPS_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let _ = seed(&service).await;
	let wrong_password = service
		.login(LoginRequest { login: "manager1".to_string(), password: "nope-nope".to_string() })
		.await;
	let wrong_role = service
		.admin_login(LoginRequest {
			login: "manager1".to_string(),
			password: "password-123".to_string(),
		})
		.await;
	let (Err(Error::Unauthorized { message: first }), Err(Error::Unauthorized { message: second })) =
		(wrong_password, wrong_role)
	else {
		panic!("Both attempts should be unauthorized.");
	};

	assert_eq!(first, second);

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn failed_qr_insert_leaves_no_image() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping failed_qr_insert_leaves_no_image; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	// A manager session whose account row does not exist fails the `created_by` foreign key.
	let ghost = Session {
		account_id: Uuid::new_v4(),
		role: Role::Manager,
		display_name: "Ghost".to_string(),
	};
	let result = service
		.generate_qr(
			&ghost,
			GenerateQrRequest {
				kind: QrKind::Clock,
				site_id: fixture.site_id,
				area_id: None,
				label: "Front entrance".to_string(),
			},
		)
		.await;

	assert!(matches!(result, Err(Error::Storage { .. })), "Unexpected result: {result:?}");

	let images = std::fs::read_dir(blobs.path().join("qr")).map(|entries| entries.count()).unwrap_or(0);

	assert_eq!(images, 0);
	assert_eq!(count(&service, "SELECT count(*) FROM qr_codes WHERE site_id = $1", fixture.site_id).await, 0);

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn clock_out_records_the_visit_and_resets_the_workflow() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!(
			"Skipping clock_out_records_the_visit_and_resets_the_workflow; set CLEANOPS_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let manager = sign_in(&service, "manager1", "password-123").await;
	let (area, code) = area_with_code(&service, &manager, fixture.site_id, &["Restock soap"]).await;
	let cleaner = sign_in(&service, &fixture.cleaner_login, "password-123").await;

	service
		.clock_in(&cleaner, ClockInRequest { scanned: code.payload.clone() })
		.await
		.expect("Clock-in should succeed.");

	let early = service.clock_out(&cleaner, ClockOutRequest::default()).await;

	assert!(matches!(early, Err(Error::Conflict { .. })), "Unexpected result: {early:?}");

	service
		.complete_task(&cleaner, TaskCompletionRequest { task_id: area.tasks[0].task_id, done: true })
		.await
		.expect("Task should complete.");

	let at_photos = service.advance(&cleaner).await.expect("Checklist should advance.");

	assert_eq!(at_photos.step, "photos");

	let with_photo = service
		.upload_photo(
			&cleaner,
			PhotoUploadRequest { bytes: b"jpeg-bytes".to_vec(), content_type: "image/jpeg".to_string() },
		)
		.await
		.expect("Photo should upload.");

	assert_eq!(with_photo.photo_urls.len(), 1);

	let at_clock_out = service.advance(&cleaner).await.expect("Photos should advance.");

	assert_eq!(at_clock_out.step, "clock_out");

	let done = service
		.clock_out(&cleaner, ClockOutRequest { notes: Some("  Out of paper towels.  ".to_string()) })
		.await
		.expect("Clock-out should succeed.");

	assert_eq!(done.tasks_completed, 1);
	assert_eq!(done.photos, 1);
	assert!(done.clock_out_at >= done.clock_in_at);

	let events: Vec<String> = sqlx::query_scalar(
		"SELECT event FROM live_tracking WHERE cleaner_id = $1 ORDER BY at ASC, event ASC",
	)
	.bind(cleaner.account_id)
	.fetch_all(&service.db.pool)
	.await
	.expect("Events should load.");

	assert_eq!(events, vec!["clock_in".to_string(), "clock_out".to_string()]);

	let (notes, photo_paths): (Option<String>, Vec<String>) =
		sqlx::query_as("SELECT notes, photo_paths FROM cleaner_logs WHERE log_id = $1")
			.bind(done.log_id)
			.fetch_one(&service.db.pool)
			.await
			.expect("Log row should exist.");

	assert_eq!(notes.as_deref(), Some("Out of paper towels."));
	assert_eq!(photo_paths.len(), 1);
	assert!(blobs.path().join(&photo_paths[0]).is_file());

	let reset = service.workflow(&cleaner).await.expect("Workflow should load.");

	assert_eq!(reset.stage, "clock_in");
	assert!(reset.checklist.is_empty());

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn simultaneous_first_clock_ins_admit_one() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping simultaneous_first_clock_ins_admit_one; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let manager = sign_in(&service, "manager1", "password-123").await;
	let (_, code) = area_with_code(&service, &manager, fixture.site_id, &["Mop floor"]).await;
	let cleaner = sign_in(&service, &fixture.cleaner_login, "password-123").await;

	assert_eq!(
		count(&service, "SELECT count(*) FROM cleaner_workflows WHERE cleaner_id = $1", cleaner.account_id)
			.await,
		0
	);

	let (first, second) = tokio::join!(
		service.clock_in(&cleaner, ClockInRequest { scanned: code.payload.clone() }),
		service.clock_in(&cleaner, ClockInRequest { scanned: code.payload.clone() }),
	);
	let outcomes = [first, second];
	let admitted = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
	let refused =
		outcomes.iter().filter(|outcome| matches!(outcome, Err(Error::Conflict { .. }))).count();

	assert_eq!((admitted, refused), (1, 1), "Unexpected outcomes: {outcomes:?}");
	assert_eq!(
		count(&service, "SELECT count(*) FROM live_tracking WHERE cleaner_id = $1", cleaner.account_id)
			.await,
		1
	);

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn stale_assist_requests_are_escalated() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping stale_assist_requests_are_escalated; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let cleaner = sign_in(&service, &fixture.cleaner_login, "password-123").await;
	let mut ids = Vec::new();

	for description in ["Spill in the lobby", "Broken dispenser"] {
		let item = service
			.report(
				&cleaner,
				AssistRequestInput {
					site_id: fixture.site_id,
					area_id: None,
					description: description.to_string(),
				},
			)
			.await
			.expect("Assist request should be reported.");

		ids.push(item.request_id);
	}

	sqlx::query(
		"UPDATE assist_requests SET updated_at = updated_at - interval '2 hours' WHERE request_id = $1",
	)
	.bind(ids[0])
	.execute(&service.db.pool)
	.await
	.expect("Failed to age the request.");

	let report = service.escalate_stale(OffsetDateTime::now_utc()).await.expect("Sweep should run.");

	assert_eq!(report.escalated, 1);

	let open = service.list_open(Some(fixture.site_id)).await.expect("Open requests should list.");
	let status_of = |id: Uuid| open.iter().find(|item| item.request_id == id).map(|item| item.status);

	assert_eq!(status_of(ids[0]), Some(AssistStatus::Escalated));
	assert_eq!(status_of(ids[1]), Some(AssistStatus::Pending));
	assert_eq!(
		count(
			&service,
			"SELECT count(*) FROM assist_events WHERE request_id = $1 AND status = 'escalated'",
			ids[0]
		)
		.await,
		1
	);

	let again = service.escalate_stale(OffsetDateTime::now_utc()).await.expect("Sweep should run.");

	assert_eq!(again.escalated, 0);

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLEANOPS_PG_DSN to run."]
async fn dragged_visits_snap_to_the_grid() {
	let Some(base_dsn) = cleanops_testkit::env_dsn() else {
		eprintln!("Skipping dragged_visits_snap_to_the_grid; set CLEANOPS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let blobs = BlobDir::new("service").expect("Failed to create blob directory.");
	let service = build_service(&test_db, blobs.path()).await;
	let fixture = seed(&service).await;
	let ops = sign_in(&service, "ops1", "password-123").await;
	let visit = service
		.create_visit(
			&ops,
			CreateVisitRequest {
				site_id: fixture.site_id,
				visit_date: date!(2026 - 03 - 02),
				start: "09:00".to_string(),
				end: "10:00".to_string(),
				notes: None,
			},
		)
		.await
		.expect("Visit should be scheduled.");
	let moved = service
		.update_visit_times(
			&ops,
			visit.visit_id,
			VisitTimeChange::Drag { drag: DragMode::Move, delta_minutes: 20 },
		)
		.await
		.expect("Drag should apply.");

	assert_eq!((moved.start.as_str(), moved.end.as_str()), ("09:15", "10:15"));

	let resized = service
		.update_visit_times(
			&ops,
			visit.visit_id,
			VisitTimeChange::Pointer { drag: DragMode::ResizeEnd, pixels: 48.0, pixels_per_slot: 24.0 },
		)
		.await
		.expect("Pointer drag should apply.");

	assert_eq!((resized.start.as_str(), resized.end.as_str()), ("09:15", "10:45"));

	let clamped = service
		.update_visit_times(
			&ops,
			visit.visit_id,
			VisitTimeChange::Drag { drag: DragMode::Move, delta_minutes: 24 * 60 },
		)
		.await
		.expect("Drag past the day should clamp.");

	assert_eq!((clamped.start.as_str(), clamped.end.as_str()), ("21:30", "23:00"));

	let manager = sign_in(&service, "manager1", "password-123").await;
	let denied = service
		.update_visit_times(
			&manager,
			visit.visit_id,
			VisitTimeChange::Drag { drag: DragMode::Move, delta_minutes: 15 },
		)
		.await;

	assert!(matches!(denied, Err(Error::Forbidden { .. })), "Unexpected result: {denied:?}");

	service.db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
