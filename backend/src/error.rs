use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Everything a mark operation can fail with. Validation kinds map to
/// 400, lookups to 404, renderer and storage failures to 500.
#[derive(Debug, thiserror::Error)]
pub enum MarkError {
    #[error("Missing required fields.")]
    MissingFields,
    #[error("{0} must be a valid number.")]
    InvalidNumber(&'static str),
    #[error("Invalid date format for {0}. Use YYYY-MM-DD.")]
    InvalidDate(&'static str),
    #[error("Marks cannot be greater than Out Of marks.")]
    MarksExceedMax,
    #[error("Student must be at least 15 years old.")]
    TooYoung,
    #[error("Student \"{name}\" already has an entry for \"{subject}\".")]
    DuplicateEntry { name: String, subject: String },
    #[error("Student \"{0}\" already has 5 subjects recorded. Cannot add more.")]
    SubjectLimitExceeded(String),
    #[error("Mark not found.")]
    NotFound,
    #[error("'newStatus' must be one of pending, pass or fail (got \"{0}\").")]
    InvalidStatus(String),
    #[error("Invalid or missing '{0}'. Must be an integer id or a list of integer ids.")]
    InvalidIdList(&'static str),
    #[error("PDF generation error: {0}")]
    Render(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl MarkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarkError::MissingFields
            | MarkError::InvalidNumber(_)
            | MarkError::InvalidDate(_)
            | MarkError::MarksExceedMax
            | MarkError::TooYoung
            | MarkError::DuplicateEntry { .. }
            | MarkError::SubjectLimitExceeded(_)
            | MarkError::InvalidStatus(_)
            | MarkError::InvalidIdList(_) => StatusCode::BAD_REQUEST,
            MarkError::NotFound => StatusCode::NOT_FOUND,
            MarkError::Render(_) | MarkError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MarkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request() {
        let errors = [
            MarkError::MissingFields,
            MarkError::InvalidNumber("Marks"),
            MarkError::InvalidDate("DOB"),
            MarkError::MarksExceedMax,
            MarkError::TooYoung,
            MarkError::DuplicateEntry {
                name: "Asha".to_string(),
                subject: "Math".to_string(),
            },
            MarkError::SubjectLimitExceeded("Asha".to_string()),
            MarkError::InvalidStatus("done".to_string()),
            MarkError::InvalidIdList("ids"),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{:?}", err);
        }
    }

    #[test]
    fn test_not_found_is_404() {
        assert_eq!(MarkError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_render_and_unexpected_are_500() {
        assert_eq!(
            MarkError::Render("font".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err = MarkError::Unexpected(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // The catch-all keeps the underlying detail for diagnosis
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_messages_name_the_offending_field() {
        assert_eq!(
            MarkError::InvalidNumber("Out Of").to_string(),
            "Out Of must be a valid number."
        );
        assert_eq!(
            MarkError::InvalidDate("Exam Date").to_string(),
            "Invalid date format for Exam Date. Use YYYY-MM-DD."
        );
        let dup = MarkError::DuplicateEntry {
            name: "Asha".to_string(),
            subject: "Math".to_string(),
        };
        assert!(dup.to_string().contains("Asha"));
        assert!(dup.to_string().contains("Math"));
    }
}
