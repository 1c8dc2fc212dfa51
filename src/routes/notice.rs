use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{debug_handler, routing, Json, Router};
use futures_util::TryStreamExt;
use mongodm::bson::{to_bson, to_document};
use mongodm::prelude::{
    MongoFindOneAndUpdateOptions, MongoFindOptions, MongoReturnDocument, ObjectId, Set,
};
use mongodm::{doc, field, ToRepository};
use serde::{Deserialize, Serialize};

use crate::mongo_entities::notice::{Notice, NoticeFilter, NoticeType};
use crate::routes::common;
use crate::routes::common::auth::AdminIdentity;
use crate::routes::common::err::AppError;
use crate::routes::common::query::{PageInfo, Pagination};
use crate::state::AppState;

const URGENT_LIMIT: i64 = 5;

#[derive(Deserialize)]
struct ListQuery {
    semester: Option<i32>,
    #[serde(rename = "type")]
    kind: Option<NoticeType>,
    page: Option<u64>,
    limit: Option<i64>,
}

/// A notice with the author's email resolved; `None` when the admin who
/// wrote it no longer exists.
#[derive(Serialize)]
struct NoticeItem {
    #[serde(flatten)]
    notice: Notice,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_by_email: Option<String>,
}

async fn with_author_emails(
    state: &AppState,
    notices: Vec<Notice>,
) -> Result<Vec<NoticeItem>, AppError> {
    let emails =
        common::admin_emails(&state.mongo_db, notices.iter().map(|n| n.created_by)).await?;
    Ok(notices
        .into_iter()
        .map(|notice| {
            let created_by_email = emails.get(&notice.created_by).cloned();
            NoticeItem {
                notice,
                created_by_email,
            }
        })
        .collect())
}

#[derive(Serialize)]
struct ListResponse {
    notices: Vec<NoticeItem>,
    pagination: PageInfo,
}

#[debug_handler]
async fn gets(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let pagination = Pagination::new(query.page, query.limit, 10);
    let filter = NoticeFilter {
        semester: query.semester,
        kind: query.kind,
        urgent_only: false,
    };
    let query_doc = filter.query(chrono::Utc::now())?;
    let total = state
        .mongo_db
        .repository::<Notice>()
        .count_documents(query_doc.clone(), None)
        .await?;
    let notices = state
        .mongo_db
        .repository::<Notice>()
        .find(
            query_doc,
            MongoFindOptions::builder()
                .sort(NoticeFilter::sort())
                .skip(pagination.skip())
                .limit(pagination.limit)
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(ListResponse {
        notices: with_author_emails(&state, notices).await?,
        pagination: pagination.info(total),
    }))
}

#[derive(Deserialize)]
struct UrgentQuery {
    semester: Option<i32>,
}

#[debug_handler]
async fn gets_urgent(
    State(state): State<AppState>,
    Query(query): Query<UrgentQuery>,
) -> Result<Json<Vec<NoticeItem>>, AppError> {
    let filter = NoticeFilter {
        semester: query.semester,
        kind: None,
        urgent_only: true,
    };
    let notices = state
        .mongo_db
        .repository::<Notice>()
        .find(
            filter.query(chrono::Utc::now())?,
            MongoFindOptions::builder()
                .sort(doc! { field!(created_at in Notice): -1 })
                .limit(URGENT_LIMIT)
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(with_author_emails(&state, notices).await?))
}

#[debug_handler]
async fn get(
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
) -> Result<Json<NoticeItem>, AppError> {
    let res = find_notice_by_id(&state, id).await?;
    if !res.visible_at(chrono::Utc::now()) {
        return Err(AppError::Forbidden("Notice not available".to_string()));
    }
    let emails = common::admin_emails(&state.mongo_db, [res.created_by]).await?;
    let created_by_email = emails.get(&res.created_by).cloned();
    Ok(Json(NoticeItem {
        notice: res,
        created_by_email,
    }))
}

async fn find_notice_by_id(state: &AppState, id: ObjectId) -> Result<Notice, AppError> {
    let res = state
        .mongo_db
        .repository::<Notice>()
        .find_one(
            doc! {
                "_id": id
            },
            None,
        )
        .await?
        .ok_or(AppError::NotFound(format!(
            "Notice with id {} does not exist!",
            id
        )))?;
    Ok(res)
}

#[derive(Deserialize)]
struct AdminListQuery {
    page: Option<u64>,
    limit: Option<i64>,
}

/// Deliberately skips the visibility filter; the admin console manages
/// drafts and expired notices through this path.
#[debug_handler]
async fn gets_admin(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let pagination = Pagination::new(query.page, query.limit, 20);
    let total = state
        .mongo_db
        .repository::<Notice>()
        .count_documents(doc! {}, None)
        .await?;
    let notices = state
        .mongo_db
        .repository::<Notice>()
        .find(
            doc! {},
            MongoFindOptions::builder()
                .sort(doc! { field!(created_at in Notice): -1 })
                .skip(pagination.skip())
                .limit(pagination.limit)
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(ListResponse {
        notices: with_author_emails(&state, notices).await?,
        pagination: pagination.info(total),
    }))
}

fn default_published() -> bool {
    true
}

#[derive(Deserialize)]
struct NoticeBody {
    title: String,
    content: String,
    #[serde(rename = "type", default)]
    kind: NoticeType,
    #[serde(rename = "targetSemesters", default)]
    target_semesters: Vec<i32>,
    #[serde(rename = "isUrgent", default)]
    is_urgent: bool,
    #[serde(rename = "isPublished", default = "default_published")]
    is_published: bool,
    #[serde(rename = "publishDate", default)]
    publish_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "expiryDate", default)]
    expiry_date: Option<chrono::DateTime<chrono::Utc>>,
}

fn validate_targets(target_semesters: &[i32], errors: &mut Vec<String>) {
    if target_semesters.iter().any(|s| !(1..=8).contains(s)) {
        errors.push("targetSemesters: every entry must be between 1 and 8".to_string());
    }
}

impl NoticeBody {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push("title: Title is required".to_string());
        }
        if self.content.trim().is_empty() {
            errors.push("content: Content is required".to_string());
        }
        validate_targets(&self.target_semesters, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[debug_handler]
async fn post(
    admin: AdminIdentity,
    State(state): State<AppState>,
    Json(body): Json<NoticeBody>,
) -> Result<(StatusCode, Json<Notice>), AppError> {
    body.validate()?;
    let now = chrono::Utc::now();
    let notice = Notice {
        _id: ObjectId::new(),
        title: body.title,
        content: body.content,
        kind: body.kind,
        target_semesters: body.target_semesters,
        is_urgent: body.is_urgent,
        is_published: body.is_published,
        // an unset publish date means "from now on"
        publish_date: body.publish_date.or(Some(now)),
        expiry_date: body.expiry_date,
        created_by: admin.id,
        created_at: now,
        updated_at: now,
    };
    state
        .mongo_db
        .repository::<Notice>()
        .insert_one(&notice, None)
        .await?;
    tracing::info!(admin = %admin.email, notice = %notice._id, "notice created");
    Ok((StatusCode::CREATED, Json(notice)))
}

/// Bodies arrive with camelCase names while the stored fields stay
/// snake_case, hence the deserialize-only renames. `type` is the one
/// name shared by both sides.
#[derive(Serialize, Deserialize)]
struct NoticeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<NoticeType>,
    #[serde(
        default,
        rename(deserialize = "targetSemesters"),
        skip_serializing_if = "Option::is_none"
    )]
    target_semesters: Option<Vec<i32>>,
    #[serde(
        default,
        rename(deserialize = "isUrgent"),
        skip_serializing_if = "Option::is_none"
    )]
    is_urgent: Option<bool>,
    #[serde(
        default,
        rename(deserialize = "isPublished"),
        skip_serializing_if = "Option::is_none"
    )]
    is_published: Option<bool>,
    #[serde(
        default,
        rename(deserialize = "publishDate"),
        skip_serializing_if = "Option::is_none"
    )]
    publish_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(
        default,
        rename(deserialize = "expiryDate"),
        skip_serializing_if = "Option::is_none"
    )]
    expiry_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl NoticeUpdate {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.push("title: Title is required".to_string());
        }
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.push("content: Content is required".to_string());
        }
        if let Some(targets) = &self.target_semesters {
            validate_targets(targets, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[debug_handler]
async fn put(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
    Json(body): Json<NoticeUpdate>,
) -> Result<Json<Notice>, AppError> {
    body.validate()?;
    let mut set = to_document(&body)?;
    set.insert(
        field!(updated_at in Notice),
        to_bson(&chrono::Utc::now())?,
    );
    let res = state
        .mongo_db
        .repository::<Notice>()
        .find_one_and_update(
            doc! {
                "_id": id
            },
            doc! { Set: set },
            MongoFindOneAndUpdateOptions::builder()
                .return_document(MongoReturnDocument::After)
                .build(),
        )
        .await?
        .ok_or(AppError::NotFound(format!(
            "Notice with id {} does not exist!",
            id
        )))?;
    Ok(Json(res))
}

#[debug_handler]
async fn delete(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
) -> Result<StatusCode, AppError> {
    state
        .mongo_db
        .repository::<Notice>()
        .find_one_and_delete(
            doc! {
                "_id": id
            },
            None,
        )
        .await?
        .ok_or(AppError::NotFound(format!(
            "Notice with id {} does not exist!",
            id
        )))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn new() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(gets).post(post))
        .route("/urgent", routing::get(gets_urgent))
        .route("/admin/all", routing::get(gets_admin))
        .route("/:id", routing::get(get).put(put).delete(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> NoticeBody {
        NoticeBody {
            title: "Midterm schedule".to_string(),
            content: "Exams start on Monday.".to_string(),
            kind: NoticeType::Exam,
            target_semesters: vec![3, 4],
            is_urgent: false,
            is_published: true,
            publish_date: None,
            expiry_date: None,
        }
    }

    #[test]
    fn valid_body_passes() {
        assert!(body().validate().is_ok());
    }

    #[test]
    fn out_of_range_target_semester_is_rejected() {
        let mut b = body();
        b.target_semesters = vec![3, 9];
        assert!(matches!(b.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn type_field_deserializes_from_the_wire_name() {
        let b: NoticeBody = serde_json::from_str(
            r#"{"title": "t", "content": "c", "type": "urgent"}"#,
        )
        .unwrap();
        assert_eq!(b.kind, NoticeType::Urgent);
        assert!(b.is_published);
        assert!(b.target_semesters.is_empty());
    }

    #[test]
    fn body_deserializes_from_the_camel_case_wire_names() {
        let b: NoticeBody = serde_json::from_str(
            r#"{
                "title": "t",
                "content": "c",
                "targetSemesters": [2, 5],
                "isUrgent": true,
                "isPublished": false,
                "publishDate": "2026-09-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(b.target_semesters, [2, 5]);
        assert!(b.is_urgent);
        assert!(!b.is_published);
        assert!(b.publish_date.is_some());
        assert!(b.expiry_date.is_none());
    }

    #[test]
    fn update_keeps_omitted_fields_out_of_the_set_document() {
        let update: NoticeUpdate =
            serde_json::from_str(r#"{"isPublished": false}"#).unwrap();
        assert!(update.validate().is_ok());
        let set = to_document(&update).unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.get_bool("is_published").unwrap());
    }

    #[test]
    fn update_maps_wire_names_onto_the_stored_fields() {
        let update: NoticeUpdate = serde_json::from_str(
            r#"{"targetSemesters": [1], "expiryDate": "2026-12-31T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(update.validate().is_ok());
        let set = to_document(&update).unwrap();
        let keys: Vec<_> = set.keys().map(String::as_str).collect();
        assert_eq!(keys, ["target_semesters", "expiry_date"]);
    }

    #[test]
    fn items_carry_the_author_email() {
        let now = chrono::Utc::now();
        let item = NoticeItem {
            notice: Notice {
                _id: ObjectId::new(),
                title: "Midterm schedule".to_string(),
                content: "Exams start on Monday.".to_string(),
                kind: NoticeType::Exam,
                target_semesters: Vec::new(),
                is_urgent: false,
                is_published: true,
                publish_date: None,
                expiry_date: None,
                created_by: ObjectId::new(),
                created_at: now,
                updated_at: now,
            },
            created_by_email: Some("admin@example.edu".to_string()),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["created_by_email"], "admin@example.edu");
        assert_eq!(value["title"], "Midterm schedule");
    }
}
