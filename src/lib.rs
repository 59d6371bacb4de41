//! Bearer-token authentication service.
//!
//! A single configured account logs in at `POST /token` and receives a signed,
//! time-limited JWT. Routes under `/users` are guarded by
//! [`auth::validator`], which verifies that token without any server-side
//! session state.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod password;
pub mod user_handlers;

use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

/// Register all routes. Expects `web::Data<auth::TokenAuthority>` in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(user_handlers::health)
        .service(user_handlers::login)
        .service(
            web::scope("/users")
                .wrap(HttpAuthentication::bearer(auth::validator))
                .service(user_handlers::me),
        );
}
