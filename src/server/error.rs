use rocket::{
    catch,
    http::Status,
    response::{self, status, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use std::fmt::Display;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// JSON error response, `{error, error_code?}` with a status
#[derive(Debug)]
pub struct ApiError {
    status: Status,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: Status, message: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.to_string(),
                error_code: None,
            },
        }
    }

    pub fn with_code(status: Status, message: &str, error_code: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.to_string(),
                error_code: Some(error_code.to_string()),
            },
        }
    }

    /// Logs the details and answers with an opaque 500
    pub fn internal(message: &str, err: impl Display) -> Self {
        log::error!("{message}: {err}");
        Self::new(Status::InternalServerError, message)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        status::Custom(self.status, Json(self.body)).respond_to(request)
    }
}

/// Everything rocket answers itself (failed guards, unknown routes, malformed bodies) as JSON too
#[catch(default)]
pub fn default_catcher(status: Status, _request: &Request<'_>) -> ApiError {
    let message = match status.code {
        401 => "Unauthorized",
        404 => "Not found",
        400 | 415 | 422 => "Bad request",
        _ => "Internal server error",
    };
    ApiError::new(status, message)
}
