use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::ErrorBody;

/// Errors as seen by HTTP clients.
///
/// Login failures and token failures collapse to one message each, so a
/// caller cannot tell a wrong username from a wrong password, or an expired
/// token from a forged one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Incorrect username or password")]
    LoginFailed,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiError::LoginFailed,
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
            AuthError::SigningError(reason) => ApiError::Internal(reason),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::LoginFailed | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(reason) = self {
            tracing::error!("request failed: {reason}");
        }

        let mut response = HttpResponse::build(self.status_code());
        if self.status_code() == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        response.json(ErrorBody {
            detail: self.to_string(),
        })
    }
}
