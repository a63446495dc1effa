use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::auth::AuthError;
use crate::application::catalog::{CatalogError, ComputeError};
use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::validation::FieldViolation;

const SOURCE: &str = "infra::http::error";

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const VALIDATION: &str = "validation_failed";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const PROJECTION: &str = "projection_error";
    pub const ENCODE: &str = "encode_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    violations: Vec<FieldViolation>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            violations: Vec::new(),
            report: None,
        }
    }

    /// Keep the full error chain for the response log without exposing it.
    fn with_source(mut self, error: &dyn std::error::Error) -> Self {
        self.report = Some(ErrorReport::from_error(SOURCE, self.status, error));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        let mut error = Self::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Request validation failed",
            None,
        );
        error.violations = violations;
        error
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "A valid bearer token is required",
            None,
        )
    }

    pub fn forbidden(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Insufficient role for this operation",
            hint,
        )
    }

    pub fn not_found(hint: Option<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, "Resource not found", hint)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                SOURCE,
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
                violations: self.violations,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Missing | AuthError::Invalid => ApiError::unauthorized(),
            AuthError::Forbidden(role) => ApiError::forbidden(Some(format!("requires {role}"))),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(error: RepoError) -> Self {
        let api = match &error {
            RepoError::NotFound => ApiError::not_found(None),
            RepoError::InvalidInput { message } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message.clone()),
            ),
            RepoError::Integrity { .. } => ApiError::new(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated",
                None,
            ),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
                None,
            ),
            RepoError::Persistence(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Persistence error",
                None,
            ),
        };
        api.with_source(&error)
    }
}

impl From<ComputeError> for ApiError {
    fn from(error: ComputeError) -> Self {
        match error {
            ComputeError::Repo(repo) => ApiError::from(repo),
            ComputeError::Projection(ref inner) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::PROJECTION,
                "Response could not be built",
                None,
            )
            .with_source(inner),
            ComputeError::Encode(ref inner) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::ENCODE,
                "Response could not be encoded",
                None,
            )
            .with_source(inner),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::Auth(auth) => ApiError::from(auth),
            CatalogError::Domain(DomainError::NotFound { entity }) => {
                ApiError::not_found(Some(format!("{entity} not found")))
            }
            CatalogError::Domain(DomainError::Validation { violations }) => {
                ApiError::validation(violations)
            }
            CatalogError::Pagination(pagination) => ApiError::validation(vec![pagination.violation()]),
            CatalogError::Compute(compute) => ApiError::from(compute),
            CatalogError::Repo(repo) => ApiError::from(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PaginationError;
    use crate::domain::roles::Role;

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(ApiError::from(AuthError::Missing).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::Invalid).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::Forbidden(Role::Admin)).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn timeouts_are_service_unavailable() {
        let error = CatalogError::Compute(ComputeError::Repo(RepoError::Timeout));
        assert_eq!(ApiError::from(error).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn pagination_errors_are_validation_failures() {
        let error = CatalogError::Pagination(PaginationError::NotPositive { field: "page" });
        let api = ApiError::from(error);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.violations[0].property_path, "page");
    }

    #[test]
    fn server_errors_carry_report() {
        let response = ApiError::from(RepoError::from_persistence("connection reset")).into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(report.messages[0].contains("connection reset"));
    }
}
