//! Mapping of aggregate results onto HTTP responses.
//!
//! Success values are serialized as JSON; problems become problem-details
//! bodies with the status they carry.

use http::{header, HeaderValue, Response, StatusCode};
use serde::Serialize;

use crate::core::Problem;

/// Standard content types
pub mod content_type {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";
}

/// Builds `http` responses from `Result<T, Problem>`
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// 200 with the value as JSON
    pub fn ok<T: Serialize>(result: Result<T, Problem>) -> Response<Vec<u8>> {
        match result {
            Ok(value) => Self::json(StatusCode::OK, &value, None),
            Err(problem) => Self::problem(&problem),
        }
    }

    /// 201 with the value as JSON and an optional `Location`
    pub fn created<T: Serialize>(
        result: Result<T, Problem>,
        location: Option<&str>,
    ) -> Response<Vec<u8>> {
        match result {
            Ok(value) => Self::json(StatusCode::CREATED, &value, location),
            Err(problem) => Self::problem(&problem),
        }
    }

    /// 202 with the value as JSON and an optional `Location`
    pub fn accepted<T: Serialize>(
        result: Result<T, Problem>,
        location: Option<&str>,
    ) -> Response<Vec<u8>> {
        match result {
            Ok(value) => Self::json(StatusCode::ACCEPTED, &value, location),
            Err(problem) => Self::problem(&problem),
        }
    }

    /// 204, the value is discarded
    pub fn no_content<T>(result: Result<T, Problem>) -> Response<Vec<u8>> {
        match result {
            Ok(_) => Self::empty(StatusCode::NO_CONTENT),
            Err(problem) => Self::problem(&problem),
        }
    }

    /// Error response for a problem.
    ///
    /// 401 and 403 are sent bare; every other status carries the problem body.
    pub fn problem(problem: &Problem) -> Response<Vec<u8>> {
        let status = problem.status_code();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::empty(status),
            _ => match serde_json::to_vec(problem) {
                Ok(body) => Self::build(status, body, Some(content_type::APPLICATION_PROBLEM_JSON), None),
                Err(e) => {
                    log::error!("Failed to serialize problem response: {}", e);
                    Self::error_http(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
            },
        }
    }

    /// Plain text error response
    pub fn error_http(status: StatusCode, message: &str) -> Response<Vec<u8>> {
        Self::build(
            status,
            message.as_bytes().to_vec(),
            Some(content_type::TEXT_PLAIN),
            None,
        )
    }

    fn json<T: Serialize>(
        status: StatusCode,
        value: &T,
        location: Option<&str>,
    ) -> Response<Vec<u8>> {
        match serde_json::to_vec(value) {
            Ok(body) => Self::build(status, body, Some(content_type::APPLICATION_JSON), location),
            Err(e) => {
                log::error!("Failed to serialize JSON response: {}", e);
                Self::problem(
                    &Problem::internal_server_error().with_detail("JSON serialization failed"),
                )
            }
        }
    }

    fn empty(status: StatusCode) -> Response<Vec<u8>> {
        Self::build(status, Vec::new(), None, None)
    }

    fn build(
        status: StatusCode,
        body: Vec<u8>,
        content_type: Option<&'static str>,
        location: Option<&str>,
    ) -> Response<Vec<u8>> {
        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        if let Some(location) = location {
            match HeaderValue::from_str(location) {
                Ok(value) => {
                    headers.insert(header::LOCATION, value);
                }
                Err(e) => {
                    log::error!("Invalid location '{}': {}", location, e);
                }
            }
        }

        response
    }
}
