use serde::{Deserialize, Serialize};

/// The single configured identity allowed to log in.
#[derive(Clone)]
pub struct Account {
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}

/// Form-encoded body of `POST /token`.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub full_name: Option<String>,
}

impl From<&Account> for Profile {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            full_name: account.full_name.clone(),
        }
    }
}

/// JWT claims. Timestamps are NumericDate seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Subject of a verified bearer token, stored in request extensions by the guard.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
