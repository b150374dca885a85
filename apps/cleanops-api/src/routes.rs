use axum::{
	Json, Router,
	body::Bytes,
	extract::{DefaultBodyLimit, FromRequestParts, Path, Query, State},
	http::{
		HeaderMap, StatusCode, Uri,
		header::{self, AUTHORIZATION, CONTENT_TYPE, COOKIE},
		request::Parts,
	},
	response::{IntoResponse, Redirect, Response},
	routing::{delete, get, patch, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::state::AppState;
use cleanops_domain::{
	qr_library::QrLibraryEntry,
	role::{Role, Session},
	routes::{self, Page, RouteDecision},
};
use cleanops_service::{
	AnalyticsRequest, AnalyticsResponse, AreaItem, AssistItem, AssistNote, AssistRequestInput,
	AssistTransitionResponse, AttendanceEntry, CleanerItem, ClockInRequest, ClockOutRequest,
	ClockOutResponse, CreateAccountRequest, CreateAccountResponse, CreateAreaRequest,
	CreateAreaResponse, CreateCustomerRequest, CreateSiteRequest, CreateVisitRequest, CustomerItem,
	DeactivateResponse, Error, GenerateQrRequest, HistoryItem, HistoryRequest, ListQrRequest,
	ListVisitsRequest, LoginRequest, LoginResponse, PhotoUploadRequest, QrCodeResponse,
	QrDeleteResponse, ScanResult, SiteItem, TaskCompletionRequest, TaskItem, UpdateTaskRequest,
	VisitEntry, VisitItem, VisitTimeChange, WeekQuery, WeekView, WorkflowView,
};

pub const SESSION_COOKIE: &str = "cleanops_session";

pub fn router(state: AppState) -> Router {
	let blob_root = state.service.cfg.storage.blobs.root.clone();
	let upload_limit = usize::try_from(state.service.cfg.storage.blobs.max_upload_bytes)
		.unwrap_or(usize::MAX);

	Router::new()
		.route("/health", get(health))
		.route("/v1/auth/login", post(login))
		.route("/v1/auth/admin_login", post(admin_login))
		.route("/v1/auth/logout", post(logout))
		.route("/v1/auth/session", get(current_session))
		.route("/v1/accounts", post(create_account))
		.route("/v1/accounts/{account_id}", delete(deactivate_account))
		.route("/v1/cleaners", get(list_cleaners))
		.route("/v1/customers", get(list_customers).post(create_customer))
		.route("/v1/sites", get(list_sites).post(create_site))
		.route("/v1/sites/{site_id}", delete(deactivate_site))
		.route("/v1/sites/{site_id}/areas", get(list_areas))
		.route("/v1/areas", post(create_area))
		.route("/v1/areas/{area_id}", delete(deactivate_area))
		.route("/v1/areas/{area_id}/tasks", get(list_tasks))
		.route("/v1/tasks/{task_id}", patch(update_task))
		.route("/v1/qr_codes", get(list_qr_codes).post(generate_qr))
		.route("/v1/qr_codes/resolve", post(resolve_qr))
		.route("/v1/qr_codes/{qr_code_id}", delete(delete_qr))
		.route("/v1/workflow", get(workflow))
		.route("/v1/workflow/clock_in", post(clock_in))
		.route("/v1/workflow/task", post(complete_task))
		.route("/v1/workflow/advance", post(advance))
		.route("/v1/workflow/back", post(back))
		.route(
			"/v1/workflow/photo",
			post(upload_photo).layer(DefaultBodyLimit::max(upload_limit)),
		)
		.route("/v1/workflow/clock_out", post(clock_out))
		.route("/v1/history", get(history))
		.route("/v1/visits", get(list_visits).post(create_visit))
		.route("/v1/visits/{visit_id}", delete(cancel_visit))
		.route("/v1/visits/{visit_id}/times", patch(update_visit_times))
		.route("/v1/calendar/attendance", get(attendance_week))
		.route("/v1/calendar/visits", get(visits_week))
		.route("/v1/analytics", get(analytics))
		.route("/v1/assist", get(list_assist).post(report_assist))
		.route("/v1/assist/{request_id}/accept", post(accept_assist))
		.route("/v1/assist/{request_id}/resolve", post(resolve_assist))
		.route("/v1/assist/{request_id}/escalate", post(escalate_assist))
		.nest_service("/blobs", ServeDir::new(blob_root))
		.route("/", get(page))
		.route("/{*path}", get(page))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// The signed-in caller, taken from a Bearer header or the session cookie.
pub struct CurrentSession(pub Session);
impl FromRequestParts<AppState> for CurrentSession {
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let token = session_token(&parts.headers).ok_or_else(|| {
			json_error(StatusCode::UNAUTHORIZED, "unauthorized", "Sign in to continue.")
		})?;
		let session = state.service.resolve_session(&token).await?;

		Ok(Self(session))
	}
}

#[derive(Debug, Serialize)]
struct PageBody {
	page: Page,
	path: &'static str,
	roles: Vec<Role>,
	session: Option<Session>,
}

#[derive(Debug, Deserialize)]
struct SiteFilter {
	customer_id: Option<Uuid>,
	site_id: Option<Uuid>,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn page(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
	let session = match session_token(&headers) {
		Some(token) => match state.service.resolve_session(&token).await {
			Ok(session) => Some(session),
			Err(Error::Unauthorized { .. }) => None,
			Err(err) => return ApiError::from(err).into_response(),
		},
		None => None,
	};

	match routes::resolve(uri.path(), session.as_ref()) {
		RouteDecision::Render(entry) => Json(PageBody {
			page: entry.page,
			path: entry.path,
			roles: entry.access.roles(),
			session,
		})
		.into_response(),
		RouteDecision::Redirect(target) => Redirect::to(target).into_response(),
		RouteDecision::NotFound =>
			json_error(StatusCode::NOT_FOUND, "not_found", "Page not found.").into_response(),
	}
}

async fn login(
	State(state): State<AppState>,
	Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.login(payload).await?;

	Ok(with_session_cookie(&state, response))
}

async fn admin_login(
	State(state): State<AppState>,
	Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.admin_login(payload).await?;

	Ok(with_session_cookie(&state, response))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
	if let Some(token) = session_token(&headers) {
		state.service.logout(&token).await?;
	}

	let cleared = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");

	Ok(([(header::SET_COOKIE, cleared)], StatusCode::NO_CONTENT).into_response())
}

async fn current_session(CurrentSession(session): CurrentSession) -> Json<Session> {
	Json(session)
}

async fn create_account(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, ApiError> {
	Ok(Json(state.service.create_account(&session, payload).await?))
}

async fn deactivate_account(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(account_id): Path<Uuid>,
) -> Result<Json<DeactivateResponse>, ApiError> {
	Ok(Json(state.service.deactivate_account(&session, account_id).await?))
}

async fn list_cleaners(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<CleanerItem>>, ApiError> {
	Ok(Json(state.service.list_cleaners(&session).await?))
}

async fn list_customers(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<CustomerItem>>, ApiError> {
	Ok(Json(state.service.list_customers(&session).await?))
}

async fn create_customer(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<CreateCustomerRequest>,
) -> Result<Json<CustomerItem>, ApiError> {
	Ok(Json(state.service.create_customer(&session, payload).await?))
}

async fn list_sites(
	State(state): State<AppState>,
	CurrentSession(_): CurrentSession,
	Query(filter): Query<SiteFilter>,
) -> Result<Json<Vec<SiteItem>>, ApiError> {
	Ok(Json(state.service.list_sites(filter.customer_id).await?))
}

async fn create_site(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<CreateSiteRequest>,
) -> Result<Json<SiteItem>, ApiError> {
	Ok(Json(state.service.create_site(&session, payload).await?))
}

async fn deactivate_site(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(site_id): Path<Uuid>,
) -> Result<Json<DeactivateResponse>, ApiError> {
	Ok(Json(state.service.deactivate_site(&session, site_id).await?))
}

async fn list_areas(
	State(state): State<AppState>,
	CurrentSession(_): CurrentSession,
	Path(site_id): Path<Uuid>,
) -> Result<Json<Vec<AreaItem>>, ApiError> {
	Ok(Json(state.service.list_areas(site_id).await?))
}

async fn create_area(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<CreateAreaRequest>,
) -> Result<Json<CreateAreaResponse>, ApiError> {
	Ok(Json(state.service.create_area(&session, payload).await?))
}

async fn deactivate_area(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(area_id): Path<Uuid>,
) -> Result<Json<DeactivateResponse>, ApiError> {
	Ok(Json(state.service.deactivate_area(&session, area_id).await?))
}

async fn list_tasks(
	State(state): State<AppState>,
	CurrentSession(_): CurrentSession,
	Path(area_id): Path<Uuid>,
) -> Result<Json<Vec<TaskItem>>, ApiError> {
	Ok(Json(state.service.list_tasks(area_id).await?))
}

async fn update_task(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(task_id): Path<Uuid>,
	Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskItem>, ApiError> {
	Ok(Json(state.service.update_task(&session, task_id, payload).await?))
}

async fn list_qr_codes(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<ListQrRequest>,
) -> Result<Json<Vec<QrLibraryEntry>>, ApiError> {
	Ok(Json(state.service.list_qr_codes(&session, query).await?))
}

async fn generate_qr(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<GenerateQrRequest>,
) -> Result<Json<QrCodeResponse>, ApiError> {
	Ok(Json(state.service.generate_qr(&session, payload).await?))
}

async fn resolve_qr(
	State(state): State<AppState>,
	CurrentSession(_): CurrentSession,
	Json(payload): Json<ClockInRequest>,
) -> Result<Json<ScanResult>, ApiError> {
	Ok(Json(state.service.resolve_scan(&payload.scanned).await?))
}

async fn delete_qr(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(qr_code_id): Path<Uuid>,
) -> Result<Json<QrDeleteResponse>, ApiError> {
	Ok(Json(state.service.delete_qr(&session, qr_code_id).await?))
}

async fn workflow(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
) -> Result<Json<WorkflowView>, ApiError> {
	Ok(Json(state.service.workflow(&session).await?))
}

async fn clock_in(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<ClockInRequest>,
) -> Result<Json<WorkflowView>, ApiError> {
	Ok(Json(state.service.clock_in(&session, payload).await?))
}

async fn complete_task(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<TaskCompletionRequest>,
) -> Result<Json<WorkflowView>, ApiError> {
	Ok(Json(state.service.complete_task(&session, payload).await?))
}

async fn advance(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
) -> Result<Json<WorkflowView>, ApiError> {
	Ok(Json(state.service.advance(&session).await?))
}

async fn back(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
) -> Result<Json<WorkflowView>, ApiError> {
	Ok(Json(state.service.back(&session).await?))
}

/// Raw image body; the Content-Type header names the format.
async fn upload_photo(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<WorkflowView>, ApiError> {
	let content_type = headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default()
		.to_string();
	let request = PhotoUploadRequest { bytes: body.to_vec(), content_type };

	Ok(Json(state.service.upload_photo(&session, request).await?))
}

async fn clock_out(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<ClockOutRequest>,
) -> Result<Json<ClockOutResponse>, ApiError> {
	Ok(Json(state.service.clock_out(&session, payload).await?))
}

async fn history(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<HistoryRequest>,
) -> Result<Json<Vec<HistoryItem>>, ApiError> {
	Ok(Json(state.service.history(&session, query).await?))
}

async fn list_visits(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<ListVisitsRequest>,
) -> Result<Json<Vec<VisitItem>>, ApiError> {
	Ok(Json(state.service.list_visits(&session, query).await?))
}

async fn create_visit(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<CreateVisitRequest>,
) -> Result<Json<VisitItem>, ApiError> {
	Ok(Json(state.service.create_visit(&session, payload).await?))
}

async fn update_visit_times(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(visit_id): Path<Uuid>,
	Json(payload): Json<VisitTimeChange>,
) -> Result<Json<VisitItem>, ApiError> {
	Ok(Json(state.service.update_visit_times(&session, visit_id, payload).await?))
}

async fn cancel_visit(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(visit_id): Path<Uuid>,
) -> Result<Json<DeactivateResponse>, ApiError> {
	Ok(Json(state.service.cancel_visit(&session, visit_id).await?))
}

async fn attendance_week(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<WeekQuery>,
) -> Result<Json<WeekView<AttendanceEntry>>, ApiError> {
	Ok(Json(state.service.attendance_week(&session, query).await?))
}

async fn visits_week(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<WeekQuery>,
) -> Result<Json<WeekView<VisitEntry>>, ApiError> {
	Ok(Json(state.service.visits_week(&session, query).await?))
}

async fn analytics(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Query(query): Query<AnalyticsRequest>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
	Ok(Json(state.service.summary(&session, query).await?))
}

async fn list_assist(
	State(state): State<AppState>,
	CurrentSession(_): CurrentSession,
	Query(filter): Query<SiteFilter>,
) -> Result<Json<Vec<AssistItem>>, ApiError> {
	Ok(Json(state.service.list_open(filter.site_id).await?))
}

async fn report_assist(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Json(payload): Json<AssistRequestInput>,
) -> Result<Json<AssistItem>, ApiError> {
	Ok(Json(state.service.report(&session, payload).await?))
}

async fn accept_assist(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(request_id): Path<Uuid>,
) -> Result<Json<AssistTransitionResponse>, ApiError> {
	Ok(Json(state.service.accept(&session, request_id).await?))
}

async fn resolve_assist(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(request_id): Path<Uuid>,
	Json(payload): Json<AssistNote>,
) -> Result<Json<AssistTransitionResponse>, ApiError> {
	Ok(Json(state.service.resolve(&session, request_id, payload).await?))
}

async fn escalate_assist(
	State(state): State<AppState>,
	CurrentSession(session): CurrentSession,
	Path(request_id): Path<Uuid>,
	Json(payload): Json<AssistNote>,
) -> Result<Json<AssistTransitionResponse>, ApiError> {
	Ok(Json(state.service.escalate(&session, request_id, payload).await?))
}

fn with_session_cookie(state: &AppState, response: LoginResponse) -> Response {
	let max_age = state.service.cfg.security.session_ttl_hours * 3_600;
	let cookie = format!(
		"{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
		response.token
	);

	([(header::SET_COOKIE, cookie)], Json(response)).into_response()
}

/// Bearer header first, then the `cleanops_session` cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
	let bearer = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|token| !token.is_empty());

	if let Some(token) = bearer {
		return Some(token.to_string());
	}

	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
		.map(|(_, value)| value.to_string())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::Unauthorized { message } =>
				json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
			Error::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "forbidden", message),
			Error::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message),
			Error::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "conflict", message),
			Error::Storage { message } | Error::Blob { message } => {
				tracing::error!(error = %message, "Request failed in the storage layer.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal",
					"Something went wrong. Please try again.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}
