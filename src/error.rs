use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single scan attempt. Every variant is terminal for that attempt;
/// the user re-triggers to retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// Missing or unusable credential. Reported before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or hosted-service failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The completion could not be read as the expected JSON array of records.
    #[error("Format error: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Transport,
    Format,
    InvalidRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Format => "format",
            ErrorKind::InvalidRequest => "invalid_request",
        };
        write!(f, "{s}")
    }
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Configuration(_) => ErrorKind::Configuration,
            ScanError::Transport(_) => ErrorKind::Transport,
            ScanError::Format(_) => ErrorKind::Format,
        }
    }

    /// Message shown to the user in place of results.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::Configuration(_) => "未配置 API Key，无法发起扫描。",
            ScanError::Transport(_) => "AI 服务连接失败，请检查网络后重试。",
            ScanError::Format(_) => "未能生成有效的量化分析数据，请调整筛选条件重试。",
        }
    }

    /// Technical detail carried by the variant.
    pub fn detail(&self) -> &str {
        match self {
            ScanError::Configuration(d) | ScanError::Transport(d) | ScanError::Format(d) => d,
        }
    }

    /// Rebuild an error from its wire representation. `InvalidRequest` has no scan
    /// counterpart and is reported as a configuration problem on the caller's side.
    pub fn from_kind(kind: ErrorKind, detail: String) -> Self {
        match kind {
            ErrorKind::Configuration | ErrorKind::InvalidRequest => ScanError::Configuration(detail),
            ErrorKind::Transport => ScanError::Transport(detail),
            ErrorKind::Format => ScanError::Format(detail),
        }
    }
}

impl From<reqwest::Error> for ScanError {
    /// The URL is stripped: it may carry credentials and the detail reaches clients.
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            ScanError::Transport(format!("request timed out: {e}"))
        } else {
            ScanError::Transport(e.to_string())
        }
    }
}

/// JSON body returned by the scanner service for any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Scan(e) => {
                let status = match e {
                    ScanError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ScanError::Transport(_) => StatusCode::BAD_GATEWAY,
                    ScanError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (
                    status,
                    ErrorBody {
                        kind: e.kind(),
                        message: e.user_message().to_string(),
                        detail: e.detail().to_string(),
                    },
                )
            }
            AppError::InvalidRequest(d) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    kind: ErrorKind::InvalidRequest,
                    message: "筛选条件无效，请检查后重试。".to_string(),
                    detail: d.clone(),
                },
            ),
            AppError::Config(d) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    kind: ErrorKind::Configuration,
                    message: "服务配置错误。".to_string(),
                    detail: d.clone(),
                },
            ),
            AppError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    kind: ErrorKind::Transport,
                    message: "服务内部错误。".to_string(),
                    detail: e.to_string(),
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_scan_error_has_distinct_user_message() {
        let errors = [
            ScanError::Configuration("no key".into()),
            ScanError::Transport("refused".into()),
            ScanError::Format("no array".into()),
        ];
        let messages: std::collections::HashSet<_> =
            errors.iter().map(|e| e.user_message()).collect();
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn kind_round_trips_through_wire_form() {
        let original = ScanError::Format("bad".into());
        let rebuilt = ScanError::from_kind(original.kind(), original.detail().to_string());
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn scan_errors_map_to_distinct_statuses() {
        let (s1, b1) = AppError::from(ScanError::Transport("x".into())).status_and_body();
        let (s2, b2) = AppError::from(ScanError::Format("y".into())).status_and_body();
        let (s3, _) = AppError::InvalidRequest("z".into()).status_and_body();
        assert_eq!(s1, StatusCode::BAD_GATEWAY);
        assert_eq!(b1.kind, ErrorKind::Transport);
        assert_eq!(s2, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(b2.detail, "y");
        assert_eq!(s3, StatusCode::BAD_REQUEST);
    }
}
