use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::browser::SessionLauncher;
use crate::data_models::BookListing;
use crate::error::SearchError;
use crate::service::SearchService;

use super::models::{ErrorResponse, HealthResponse, book_name_param};

pub const INVALID_INPUT_MESSAGE: &str = "Book name is required";
pub const EXTRACTION_FAILURE_MESSAGE: &str = "Error occurred while searching";
pub const BUSY_MESSAGE: &str = "Too many searches in progress, try again later";

pub async fn search_handler<L: SessionLauncher>(
    State(service): State<Arc<SearchService<L>>>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<BookListing>>, SearchError> {
    let book_name = book_name_param(raw_query.as_deref());
    let results = service.search(book_name.as_deref()).await?;
    Ok(Json(results))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SearchError::InvalidInput => (StatusCode::BAD_REQUEST, INVALID_INPUT_MESSAGE),
            SearchError::Busy => (StatusCode::SERVICE_UNAVAILABLE, BUSY_MESSAGE),
            SearchError::ExtractionFailure(e) => {
                tracing::error!("search failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, EXTRACTION_FAILURE_MESSAGE)
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
