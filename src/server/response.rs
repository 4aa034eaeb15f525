use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CONTENT_RANGE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;
use crate::store::{ListResponse, QueryFilter};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// Renders a list page with a `Content-Range: <resource> <start>-<end>/<total>`
/// header, `end` being the inclusive index of the last row served.
pub fn list_response<T: Serialize>(
    resource: &str,
    filter: &QueryFilter,
    list: ListResponse<T>,
) -> Response {
    let start = filter.range[0].max(0);
    let end = (start + list.data.len() as i64 - 1).max(start);
    let range = format!("{resource} {start}-{end}/{}", list.total);
    let mut response = Json(list).into_response();
    if let Ok(value) = HeaderValue::from_str(&range) {
        response.headers_mut().insert(CONTENT_RANGE, value);
    }
    response
}

/// Builds a filter from the raw query string of a list request.
pub fn parse_filter(query: Option<&str>) -> Result<QueryFilter, ApiError> {
    QueryFilter::from_query_string(query.unwrap_or_default()).map_err(ApiError::from)
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match &e {
            Error::Validation(_) | Error::BadRequest(_) => ApiError::bad_request(e.to_string()),
            Error::NotFound | Error::NotUpdated => ApiError::not_found(e.to_string()),
            Error::Forbidden => ApiError::forbidden(e.to_string()),
            _ if e.is_constraint() => ApiError::conflict(e.to_string()),
            _ => {
                tracing::error!("Store error: {e}");
                ApiError::internal("internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Extension trait for attaching a message to store failures that are not
/// otherwise classified (validation, not-found, constraint keep their status).
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for crate::error::Result<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            let api = ApiError::from(e);
            if api.status == StatusCode::INTERNAL_SERVER_ERROR {
                ApiError::internal(message)
            } else {
                api
            }
        })
    }
}
