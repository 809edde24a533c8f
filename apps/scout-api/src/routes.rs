use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::{HeaderMap, HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use scout_service::{
	Error as ServiceError, PurgeRequest, PurgeResponse, SearchRequest, SearchResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search/hybrid", post(search))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/cache/purge", post(purge_cache)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let tenant_id = tenant_id(&state, &headers)?;
	let Json(payload) = payload?;
	let response = state.service.search(&tenant_id, payload).await?;

	Ok(Json(response))
}

async fn purge_cache(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Option<Json<PurgeRequest>>, JsonRejection>,
) -> Result<Json<PurgeResponse>, ApiError> {
	let tenant_id = tenant_id(&state, &headers)?;
	// The body is optional; no body purges every namespace.
	let payload = payload?.map(|Json(payload)| payload).unwrap_or_default();
	let response = state.service.purge_cache(&tenant_id, payload).await?;

	Ok(Json(response))
}

fn tenant_id(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
	let value = headers
		.get(state.tenant_header.as_str())
		.and_then(|value| value.to_str().ok())
		.map(str::trim)
		.filter(|value| !value.is_empty());

	match value {
		Some(value) => Ok(value.to_string()),
		None => Err(ApiError::new(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("Missing {} header.", state.tenant_header),
		)),
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error: &'static str,
	message: String,
	retry_after_secs: Option<u64>,
}
impl ApiError {
	fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
		Self { status, error, message: message.into(), retry_after_secs: None }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let kind = err.kind();

		match err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, kind, message),
			ServiceError::RetrievalFailure { message }
			| ServiceError::EmbeddingUnavailable { message } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, kind, message),
			ServiceError::RateLimited { retry_after_secs } => Self {
				retry_after_secs: Some(retry_after_secs),
				..Self::new(
					StatusCode::TOO_MANY_REQUESTS,
					kind,
					format!("Too many requests; retry after {retry_after_secs}s."),
				)
			},
			ServiceError::Storage { .. } | ServiceError::Internal { .. } => {
				tracing::error!(error = %err, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, kind, "Internal server error.")
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error: self.error, message: self.message };
		let mut response = (self.status, Json(body)).into_response();

		if let Some(secs) = self.retry_after_secs {
			response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}
