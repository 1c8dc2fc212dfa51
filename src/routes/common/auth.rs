use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::http::request::Parts;
use axum::TypedHeader;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodm::prelude::ObjectId;
use mongodm::{doc, ToRepository};
use serde::{Deserialize, Serialize};

use crate::mongo_entities::admin::Admin;
use crate::routes::common::err::AppError;
use crate::state::AppState;

pub(crate) const TOKEN_LIFETIME_DAYS: i64 = 7;

#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// HS256 signing and verification keys derived from the configured secret.
pub(crate) struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub(crate) fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub(crate) fn issue(&self, admin_id: ObjectId) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: admin_id.to_hex(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Checks signature and expiry; any failure collapses into the same
    /// unauthorized answer.
    pub(crate) fn verify(&self, token: &str) -> Result<ObjectId, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AppError::Unauthorized("Token is not valid".to_string()))?;
        ObjectId::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Token is not valid".to_string()))
    }
}

/// The gate in front of every mutating route: bearer token out of the
/// header, verified, resolved to a stored admin.
pub(crate) struct AdminIdentity {
    pub(crate) id: ObjectId,
    pub(crate) email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Unauthorized(
                        "No token provided, authorization denied".to_string(),
                    )
                })?;
        let state = AppState::from_ref(state);
        let id = state.jwt.verify(bearer.token())?;
        let admin = state
            .mongo_db
            .repository::<Admin>()
            .find_one(
                doc! {
                    "_id": id
                },
                None,
            )
            .await?
            .ok_or_else(|| AppError::Unauthorized("Token is not valid".to_string()))?;
        Ok(Self {
            id: admin._id,
            email: admin.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_to_the_same_admin() {
        let keys = JwtKeys::new("test secret");
        let id = ObjectId::new();
        let token = keys.issue(id).unwrap();
        assert_eq!(keys.verify(&token).unwrap(), id);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let keys = JwtKeys::new("test secret");
        let other = JwtKeys::new("other secret");
        let token = keys.issue(ObjectId::new()).unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = JwtKeys::new("test secret");
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            iat: (now - chrono::Duration::days(8)).timestamp(),
            // past the default decoding leeway
            exp: (now - chrono::Duration::days(1)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(matches!(
            keys.verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let keys = JwtKeys::new("test secret");
        assert!(matches!(
            keys.verify("not.a.token"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
