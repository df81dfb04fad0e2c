use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const BOOK_NAME_PARAM: &str = "bookName";

/// First `bookName` value in a raw query string. Repeated keys and stray
/// pairs are tolerated; only a missing key gives `None`.
pub fn book_name_param(raw_query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(raw_query?.as_bytes())
        .find(|(key, _)| key == BOOK_NAME_PARAM)
        .map(|(_, value)| value.into_owned())
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> ErrorResponse {
        ErrorResponse {
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
