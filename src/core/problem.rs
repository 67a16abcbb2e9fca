//! Structured problem details returned at the response boundary

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::error::AggregateError;

/// A transport-style error: status code plus human readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub status: u16,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            title: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            detail: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn conflict() -> Self {
        Self::new(StatusCode::CONFLICT)
    }

    pub fn unprocessable_entity() -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Status as an `http` type; unknown codes collapse to 500.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} {}: {}", self.status, self.title, detail),
            None => write!(f, "{} {}", self.status, self.title),
        }
    }
}

impl std::error::Error for Problem {}

impl From<AggregateError> for Problem {
    fn from(err: AggregateError) -> Self {
        Problem::internal_server_error().with_detail(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Problem::bad_request().status, 400);
        assert_eq!(Problem::unauthorized().status, 401);
        assert_eq!(Problem::forbidden().status, 403);
        assert_eq!(Problem::not_found().status, 404);
        assert_eq!(Problem::conflict().status, 409);
        assert_eq!(Problem::unprocessable_entity().status, 422);

        let problem = Problem::internal_server_error();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.title, "Internal Server Error");
        assert!(problem.detail.is_none());
    }

    #[test]
    fn test_from_aggregate_error() {
        let problem: Problem = AggregateError::capability("upstream down").into();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail.as_deref(), Some("upstream down"));
    }

    #[test]
    fn test_serialization_skips_missing_detail() {
        let json = serde_json::to_value(Problem::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": 404, "title": "Not Found" }));
    }

    #[test]
    fn test_unknown_status_code() {
        let problem = Problem {
            status: 42,
            title: "odd".to_string(),
            detail: None,
        };
        assert_eq!(problem.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
