use crate::auth::TokenAuthority;
use crate::error::ApiError;
use crate::models::{AuthenticatedUser, LoginForm, Profile, TokenResponse};
use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::Utc;

/// Exchange form-encoded credentials for a bearer token.
#[post("/token")]
pub async fn login(
    form: web::Form<LoginForm>,
    authority: web::Data<TokenAuthority>,
) -> Result<web::Json<TokenResponse>, ApiError> {
    let account = authority
        .authenticate(&form.username, &form.password)
        .map_err(|err| {
            tracing::info!(username = %form.username, "login rejected: {err}");
            ApiError::from(err)
        })?;

    let token = authority.issue_token(account, Utc::now()).map_err(|err| {
        tracing::error!("failed to issue token: {err}");
        ApiError::from(err)
    })?;

    tracing::info!(username = %account.username, "issued access token");
    Ok(web::Json(TokenResponse::bearer(token)))
}

/// Profile of the caller. Mounted behind the bearer guard.
#[get("/me")]
pub async fn me(
    user: web::ReqData<AuthenticatedUser>,
    authority: web::Data<TokenAuthority>,
) -> Result<web::Json<Profile>, ApiError> {
    match authority.account_for(&user.subject) {
        Some(account) => Ok(web::Json(Profile::from(account))),
        None => {
            tracing::debug!(subject = %user.subject, "token subject is not a known account");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Simple health check
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}
