use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{service} returned status {status}")]
    UpstreamStatus {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{service} did not answer in time")]
    UpstreamTimeout { service: &'static str },

    #[error("{service} request failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("state rows have {width} columns, at least {required} required")]
    RowTooNarrow { width: usize, required: usize },

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

impl AppError {
    /// Classifies a transport error from `service`, separating timeouts.
    pub fn upstream(service: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            AppError::UpstreamTimeout { service }
        } else {
            AppError::Upstream { service, source }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamStatus { .. }
            | AppError::Upstream { .. }
            | AppError::RowTooNarrow { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!("request failed with {}: {}", status, self);
        (status, format!("Error: {}", self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = AppError::UpstreamStatus {
            service: "OpenSky",
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::UpstreamTimeout { service: "ipstack" }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::RowTooNarrow { width: 5, required: 9 }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::InvalidCoordinate("lat".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
