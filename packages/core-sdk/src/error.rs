use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{llm::UpstreamError, models::ErrorResponse, telemetry};

pub const EMPTY_GOAL: &str = "goal must not be empty";
pub const EMPTY_ANSWERS: &str = "answers must not be empty";

/**
 * \brief HTTP 层错误；每个变体对应固定状态码与对外文案。
 */
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("malformed request body: {0}")]
    MalformedRequest(String),
    #[error("goal is too unclear to summarize")]
    UnclearGoal,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /** \brief 上游成功返回，但内容无法解析为期望结构 */
    #[error("unexpected upstream reply: {0}")]
    UnexpectedReply(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedRequest(_) | Self::UnclearGoal => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream(_) | Self::UnexpectedReply(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /**
     * \brief 返回给调用方的文案；上游与内部细节只进日志。
     */
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.to_string(),
            Self::MalformedRequest(_) => "malformed request body".to_string(),
            Self::UnclearGoal => self.to_string(),
            Self::Upstream(_) | Self::UnexpectedReply(_) => {
                "upstream completion failed".to_string()
            }
            Self::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            telemetry::log_error("server.api", &format!("{} -> {}", status, self));
        } else {
            telemetry::log_event("server.api", &format!("rejected {} -> {}", status, self));
        }
        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}
