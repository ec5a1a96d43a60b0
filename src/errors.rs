// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KisskinError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("{message}")]
    Upstream {
        message: String,
        detail: Option<String>,
    },

    #[error("Internal server error")]
    Internal(String),
}

impl KisskinError {
    pub fn upstream(message: impl Into<String>) -> Self {
        KisskinError::Upstream {
            message: message.into(),
            detail: None,
        }
    }

    pub fn upstream_with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        KisskinError::Upstream {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl ResponseError for KisskinError {
    fn error_response(&self) -> HttpResponse {
        match self {
            KisskinError::Config(_) => HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": self.to_string() })),
            KisskinError::Validation(_) => HttpResponse::BadRequest()
                .json(serde_json::json!({ "error": self.to_string() })),
            KisskinError::ImageProcessing(_) => HttpResponse::BadRequest()
                .json(serde_json::json!({ "error": self.to_string() })),
            KisskinError::Upstream { message, detail } => {
                let body = match detail {
                    Some(detail) => serde_json::json!({ "error": message, "detail": detail }),
                    None => serde_json::json!({ "error": message }),
                };
                HttpResponse::BadGateway().json(body)
            }
            // The inner String is kept for logs only; clients get the safe message.
            KisskinError::Internal(_) => HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": self.to_string() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = KisskinError::Validation("Missing required fields".into());
        assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_maps_to_bad_gateway() {
        let err = KisskinError::upstream_with_detail("OpenAI API error", "rate limited");
        assert_eq!(err.error_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn config_message_is_preserved() {
        let err = KisskinError::Config("API key not configured".into());
        assert_eq!(err.to_string(), "API key not configured");
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_hides_the_underlying_cause() {
        let err = KisskinError::Internal("connection pool poisoned".into());
        assert_eq!(err.to_string(), "Internal server error");
    }
}
