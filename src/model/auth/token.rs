use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{api::ApiId, mongodb::Id};

use super::user::{Rights, Role};

/// Name of the cookie the session token is issued in.
pub const AUTH_TOKEN_COOKIE: &str = "token";

/// A verified session token representing a specific user with specific rights.
///
/// Tokens are issued by the authentication collaborator; this crate only
/// verifies them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    id: ApiId,
    role: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// The authenticated user's ID.
    pub fn id(&self) -> Id {
        *self.id
    }

    /// Verify and decode a raw JWT.
    pub fn decode(raw: &str, config: &Config) -> Result<Self, Error> {
        jsonwebtoken::decode(
            raw,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)
        .map_err(|e| Error::Unauthorized(e.to_string()))
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Extract the raw token from the session cookie, falling back to an
/// `Authorization: Bearer` header.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: Role + Send,
{
    type Error = Error;

    /// Decode the caller's token and check its rights are admitted by this role.
    /// Anything less forwards, so that an unauthenticated fallback route can
    /// answer with `Unauthorized`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    Error::storage("application config is not managed"),
                ))
            }
        };

        let raw = match raw_token(req) {
            Some(raw) => raw,
            None => return Outcome::Forward(Status::Unauthorized),
        };

        match Self::decode(&raw, config) {
            Ok(token) if U::admits(token.role) => Outcome::Success(token),
            Ok(_) => Outcome::Forward(Status::Unauthorized),
            Err(e) => {
                debug!("Rejected session token: {e}");
                Outcome::Forward(Status::Unauthorized)
            }
        }
    }
}
