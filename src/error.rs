use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::{flash::Flashes, views};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => views::render(
                StatusCode::NOT_FOUND,
                "errors/404",
                "Not Found",
                Flashes::default(),
                json!({}),
            ),
            AppError::Internal(e) => {
                error!(error = ?e, "request failed");
                views::render(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "errors/500",
                    "Server Error",
                    Flashes::default(),
                    json!({}),
                )
            }
        }
    }
}
