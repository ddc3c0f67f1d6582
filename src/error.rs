use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error visible para el cliente HTTP.
///
/// El endpoint /stream responde texto plano (igual que el reproductor lo
/// espera); el resto de endpoints responde JSON `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing URL")]
    MissingUrl,

    #[error("Missing query")]
    MissingQuery,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Streaming failed - no available formats")]
    NoAvailableFormats,

    #[error("Requested range not satisfiable")]
    RangeNotSatisfiable,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl | ApiError::MissingQuery | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::NoAvailableFormats | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Respuestas de texto plano del camino de streaming
            ApiError::MissingUrl | ApiError::NoAvailableFormats | ApiError::RangeNotSatisfiable => {
                Response::builder()
                    .status(status)
                    .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(Body::from(self.to_string()))
                    .unwrap_or_else(|_| status.into_response())
            }
            other => {
                let body = serde_json::json!({ "error": other.to_string() });
                (status, axum::Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_is_400() {
        assert_eq!(ApiError::MissingUrl.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_exhausted_formats_is_500_with_distinct_message() {
        let err = ApiError::NoAvailableFormats;
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Streaming failed - no available formats");
    }

    #[test]
    fn test_not_found_is_404() {
        let err = ApiError::NotFound("Playlist not found".to_string());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
