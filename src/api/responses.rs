//! Common API response types

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;

use crate::models::TranslatorError;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// HTTP status for each error kind
pub fn status_for(error: &TranslatorError) -> StatusCode {
    match error {
        TranslatorError::InvalidAddress { .. }
        | TranslatorError::LocalAddress { .. }
        | TranslatorError::UnsupportedProtocol(_)
        | TranslatorError::Validation(_)
        | TranslatorError::Serialization(_) => StatusCode::BAD_REQUEST,
        TranslatorError::NotFound { .. } => StatusCode::NOT_FOUND,
        TranslatorError::ConnectFailed { .. }
        | TranslatorError::Transport(_)
        | TranslatorError::Network(_)
        | TranslatorError::Directory(_) => StatusCode::BAD_GATEWAY,
        TranslatorError::PortExhaustion { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TranslatorError::Config(_) | TranslatorError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert TranslatorError to HTTP response
impl From<TranslatorError> for HttpResponse {
    fn from(error: TranslatorError) -> Self {
        HttpResponse::build(status_for(&error)).json(ApiResponse::<()>::error(error.to_string()))
    }
}

/// Wrap a TranslatorError so handlers can use `?`
pub fn api_error(error: TranslatorError) -> actix_web::Error {
    actix_web::error::InternalError::from_response(error.to_string(), HttpResponse::from(error))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&TranslatorError::local_address("http://127.0.0.1")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&TranslatorError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&TranslatorError::connect_failed("p@http://10.0.0.9", "refused")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&TranslatorError::PortExhaustion { start: 1, end: 2 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&TranslatorError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body() {
        let json = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "nope");
        assert!(json.get("data").is_none());
    }
}
