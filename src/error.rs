use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// The taxonomy of errors the coordinator can surface, one variant per
/// propagation kind. Every variant carries a stable `code` used on the wire.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

impl AppError {
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    fn code(&self) -> &str {
        match self {
            AppError::NotFound(what) => match *what {
                "bot" => "UnknownBot",
                "job" => "UnknownJob",
                other => other,
            },
            AppError::Conflict { code, .. } => code,
            AppError::BadRequest(_) => "BadRequest",
            AppError::Unauthorized => "Unauthorized",
            AppError::Transient(_) => "Transient",
            AppError::Fatal(_) => "Fatal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, AppError::Fatal(_)) {
            tracing::error!(error = %self, "fatal invariant violation");
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Maps a raw sqlx error onto the taxonomy. Constraint violations that encode
/// business rules become `Conflict`; everything else that reaches this point
/// unexpectedly is treated as transient (the caller can retry).
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(constraint) = db_err.constraint() {
                let code = match constraint {
                    "bots_current_job_id_key" => "unique_bot_current_job",
                    "jobs_pending_claimed_by_check" => "job_state_consistency",
                    other => {
                        return AppError::Conflict {
                            code: "constraint_violation",
                            message: format!("constraint `{other}` violated"),
                        }
                    }
                };
                return AppError::Conflict {
                    code,
                    message: db_err.message().to_string(),
                };
            }
        }
        AppError::Transient(err.to_string())
    }
}
