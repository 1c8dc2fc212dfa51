use std::sync::OnceLock;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{debug_handler, routing, Json, Router};
use mongodm::{doc, field, prelude::ObjectId, ToRepository};
use serde::{Deserialize, Serialize};

use crate::mongo_entities::admin::Admin;
use crate::routes::common::err::AppError;
use crate::state::AppState;

fn email_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if !email_pattern().is_match(email) {
        errors.push("email: Invalid email format".to_string());
    }
    if password.len() < 6 {
        errors.push("password: Password must be at least 6 characters".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn get_hash(cost: u8, salt: [u8; 16], password: String) -> Result<[u8; 24], AppError> {
    tokio::task::spawn_blocking(move || passwords::hasher::bcrypt(cost, &salt, &password))
        .await?
        .map_err(|e| AppError::AnyHow(anyhow::anyhow!(e)))
}

#[derive(Deserialize)]
struct CredentialsBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AdminView {
    id: ObjectId,
    email: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
    admin: AdminView,
}

async fn try_find_admin(state: &AppState, email: &str) -> Result<Option<Admin>, AppError> {
    let res = state
        .mongo_db
        .repository::<Admin>()
        .find_one(
            doc! {
                field!(email in Admin): email
            },
            None,
        )
        .await?;
    Ok(res)
}

/// A missing admin and a wrong password answer identically; nothing leaks
/// which half of the pair was wrong.
#[debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<TokenResponse>, AppError> {
    validate_credentials(&body.email, &body.password)?;
    let email = body.email.trim().to_lowercase();
    let admin = try_find_admin(&state, &email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid credentials".to_string()))?;
    let hash = get_hash(state.hash_cost, admin.salt, body.password).await?;
    if hash.to_vec() != admin.password_hash {
        return Err(AppError::BadRequest("Invalid credentials".to_string()));
    }
    let token = state.jwt.issue(admin._id)?;
    Ok(Json(TokenResponse {
        token,
        admin: AdminView {
            id: admin._id,
            email: admin.email,
        },
    }))
}

/// One-time bootstrap; conflicts as soon as any admin record exists.
#[debug_handler]
async fn setup(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let existing = state
        .mongo_db
        .repository::<Admin>()
        .find_one(doc! {}, None)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Admin already exists".to_string()));
    }
    validate_credentials(&body.email, &body.password)?;

    let salt = passwords::hasher::gen_salt();
    let now = chrono::Utc::now();
    let admin = Admin {
        _id: ObjectId::new(),
        email: body.email.trim().to_lowercase(),
        salt,
        password_hash: get_hash(state.hash_cost, salt, body.password).await?.into(),
        created_at: now,
        updated_at: now,
    };
    state
        .mongo_db
        .repository::<Admin>()
        .insert_one(&admin, None)
        .await?;

    let token = state.jwt.issue(admin._id)?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            admin: AdminView {
                id: admin._id,
                email: admin.email,
            },
        }),
    ))
}

pub(super) fn new() -> Router<AppState> {
    Router::new()
        .route("/login", routing::post(login))
        .route("/setup", routing::post(setup))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_credentials_pass() {
        assert!(validate_credentials("admin@example.edu", "hunter22").is_ok());
    }

    #[test]
    fn malformed_email_is_reported_per_field() {
        let err = validate_credentials("not-an-email", "hunter22");
        match err {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("email:"));
            }
            _ => panic!("expected a validation error"),
        }
    }

    #[test]
    fn short_password_and_bad_email_are_both_reported() {
        match validate_credentials("nope", "abc") {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            _ => panic!("expected a validation error"),
        }
    }
}
