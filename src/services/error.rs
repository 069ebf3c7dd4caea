//! Route-boundary error mapping
//!
//! Handlers return a bare `StatusCode`; the helpers here turn store and
//! platform failures into one, logging the cause on the way out so the
//! response body stays free of internals.

use axum::http::StatusCode;

use super::platform::PlatformError;
use super::publisher::PublishError;

/// Log an error with context and collapse it to an HTTP status.
pub trait LogErr<T> {
    /// 500 for store and other unexpected failures
    fn log_500(self, context: &str) -> Result<T, StatusCode>;

    /// Same, with a caller-chosen status
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, StatusCode> {
        self.log_status(context, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, StatusCode> {
        self.map_err(|e| {
            eprintln!("{}: {}", context, e);
            status
        })
    }
}

impl PublishError {
    /// HTTP-equivalent status for the publish endpoint
    pub fn status_code(&self) -> StatusCode {
        match self {
            PublishError::NotFound(_) => StatusCode::NOT_FOUND,
            PublishError::Conflict(_) => StatusCode::CONFLICT,
            PublishError::Remote(PlatformError::Auth(_)) => StatusCode::UNAUTHORIZED,
            PublishError::Remote(PlatformError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PublishError::Remote(_) => StatusCode::BAD_GATEWAY,
            PublishError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_errors_map_to_distinct_statuses() {
        assert_eq!(
            PublishError::NotFound("post not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PublishError::Conflict("already posting").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PublishError::Remote(PlatformError::Auth("rejected".into())).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            PublishError::Remote(PlatformError::Validation("bad options".into())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            PublishError::Remote(PlatformError::Unavailable("down".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PublishError::Store(sqlx::Error::PoolClosed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn log_500_collapses_any_display_error() {
        let result: Result<(), &str> = Err("boom");
        assert_eq!(
            result.log_500("test context"),
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }
}
