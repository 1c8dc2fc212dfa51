use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{debug_handler, routing, Json, Router};
use futures_util::TryStreamExt;
use mongodm::bson::{to_bson, to_document};
use mongodm::prelude::{
    MongoFindOneAndUpdateOptions, MongoFindOptions, MongoReturnDocument, Set,
};
use mongodm::{doc, field, ToRepository};
use serde::{Deserialize, Serialize};

use crate::mongo_entities::subject::Subject;
use crate::routes::common::auth::AdminIdentity;
use crate::routes::common::err::AppError;
use crate::state::AppState;

#[derive(Serialize, Deserialize)]
struct SubjectBody {
    name: String,
    code: String,
    semester: i32,
    credit_hours: i32,
    lecture_hours: i32,
    #[serde(default)]
    tutorial_hours: i32,
    #[serde(default)]
    lab_hours: i32,
    #[serde(default)]
    description: Option<String>,
}

impl SubjectBody {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name: Subject name is required".to_string());
        }
        if self.code.trim().is_empty() {
            errors.push("code: Subject code is required".to_string());
        }
        if !(1..=8).contains(&self.semester) {
            errors.push("semester: must be between 1 and 8".to_string());
        }
        for (field, hours) in [
            ("credit_hours", self.credit_hours),
            ("lecture_hours", self.lecture_hours),
            ("tutorial_hours", self.tutorial_hours),
            ("lab_hours", self.lab_hours),
        ] {
            if hours < 0 {
                errors.push(format!("{field}: must not be negative"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[debug_handler]
async fn gets(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, AppError> {
    let res = state
        .mongo_db
        .repository::<Subject>()
        .find(
            doc! {},
            MongoFindOptions::builder()
                .sort(doc! {
                    field!(semester in Subject): 1,
                    field!(name in Subject): 1
                })
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(res))
}

#[debug_handler]
async fn gets_by_semester(
    State(state): State<AppState>,
    Path(semester): Path<i32>,
) -> Result<Json<Vec<Subject>>, AppError> {
    if !(1..=8).contains(&semester) {
        return Err(AppError::BadRequest("Invalid semester number".to_string()));
    }
    let res = state
        .mongo_db
        .repository::<Subject>()
        .find(
            doc! {
                field!(semester in Subject): semester
            },
            MongoFindOptions::builder()
                .sort(doc! { field!(name in Subject): 1 })
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(res))
}

#[debug_handler]
async fn get(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Subject>, AppError> {
    let res = find_subject_by_code(&state, &code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {} does not exist!", code)))?;
    Ok(Json(res))
}

async fn find_subject_by_code(state: &AppState, code: &str) -> Result<Option<Subject>, AppError> {
    let res = state
        .mongo_db
        .repository::<Subject>()
        .find_one(
            doc! {
                field!(code in Subject): code.to_uppercase()
            },
            None,
        )
        .await?;
    Ok(res)
}

#[debug_handler]
async fn post(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Json(body): Json<SubjectBody>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    body.validate()?;
    if find_subject_by_code(&state, &body.code).await?.is_some() {
        return Err(AppError::Conflict("Subject code already exists".to_string()));
    }
    let now = chrono::Utc::now();
    let subject = Subject {
        _id: mongodm::prelude::ObjectId::new(),
        name: body.name,
        code: body.code.to_uppercase(),
        semester: body.semester,
        credit_hours: body.credit_hours,
        lecture_hours: body.lecture_hours,
        tutorial_hours: body.tutorial_hours,
        lab_hours: body.lab_hours,
        description: body.description,
        created_at: now,
        updated_at: now,
    };
    state
        .mongo_db
        .repository::<Subject>()
        .insert_one(&subject, None)
        .await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[debug_handler]
async fn put(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<SubjectBody>,
) -> Result<Json<Subject>, AppError> {
    body.validate()?;
    let new_code = body.code.to_uppercase();
    let mut set = to_document(&body)?;
    set.insert(field!(code in Subject), new_code);
    set.insert(
        field!(updated_at in Subject),
        to_bson(&chrono::Utc::now())?,
    );
    let res = state
        .mongo_db
        .repository::<Subject>()
        .find_one_and_update(
            doc! {
                field!(code in Subject): code.to_uppercase()
            },
            doc! { Set: set },
            MongoFindOneAndUpdateOptions::builder()
                .return_document(MongoReturnDocument::After)
                .build(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {} does not exist!", code)))?;
    Ok(Json(res))
}

#[debug_handler]
async fn delete(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .mongo_db
        .repository::<Subject>()
        .find_one_and_delete(
            doc! {
                field!(code in Subject): code.to_uppercase()
            },
            None,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {} does not exist!", code)))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn new() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(gets).post(post))
        .route("/semester/:semester", routing::get(gets_by_semester))
        .route("/:code", routing::get(get).put(put).delete(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> SubjectBody {
        SubjectBody {
            name: "Data Structures".to_string(),
            code: "cs201".to_string(),
            semester: 3,
            credit_hours: 3,
            lecture_hours: 3,
            tutorial_hours: 1,
            lab_hours: 2,
            description: None,
        }
    }

    #[test]
    fn valid_body_passes() {
        assert!(body().validate().is_ok());
    }

    #[test]
    fn out_of_range_semester_is_rejected() {
        let mut b = body();
        b.semester = 9;
        assert!(matches!(b.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn negative_hours_are_each_reported() {
        let mut b = body();
        b.credit_hours = -1;
        b.lab_hours = -2;
        match b.validate() {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            _ => panic!("expected a validation error"),
        }
    }
}
