use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::str::FromStr;

use axum::body::StreamBody;
use axum::extract::{Multipart, Path, Query, State};
use axum::headers::{ContentDisposition, ContentLength, ContentType, Header, HeaderValue};
use axum::http::StatusCode;
use axum::{debug_handler, routing, Json, Router, TypedHeader};
use futures_util::TryStreamExt;
use mongodm::bson::{to_bson, to_document};
use mongodm::prelude::{
    Inc, MongoFindOneAndUpdateOptions, MongoFindOptions, MongoReturnDocument, ObjectId, Set,
};
use mongodm::{doc, field, ToRepository};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::mongo_entities::content::{group_by_category, Category, Content, ContentFilter};
use crate::routes::common;
use crate::routes::common::auth::AdminIdentity;
use crate::routes::common::err::AppError;
use crate::routes::common::query::{PageInfo, Pagination};
use crate::state::AppState;
use crate::storage::{self, FileStore, UploadError};

#[derive(Deserialize)]
struct ListQuery {
    semester: Option<i32>,
    #[serde(rename = "subjectCode")]
    subject_code: Option<String>,
    category: Option<Category>,
    search: Option<String>,
    page: Option<u64>,
    limit: Option<i64>,
}

/// A content record with the uploader's email resolved, the way listings
/// present it; `None` when the uploading admin no longer exists.
#[derive(Serialize)]
struct ContentItem {
    #[serde(flatten)]
    content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    uploaded_by_email: Option<String>,
}

async fn with_uploader_emails(
    state: &AppState,
    content: Vec<Content>,
) -> Result<Vec<ContentItem>, AppError> {
    let emails =
        common::admin_emails(&state.mongo_db, content.iter().map(|c| c.uploaded_by)).await?;
    Ok(content
        .into_iter()
        .map(|content| {
            let uploaded_by_email = emails.get(&content.uploaded_by).cloned();
            ContentItem {
                content,
                uploaded_by_email,
            }
        })
        .collect())
}

#[derive(Serialize)]
struct ListResponse {
    content: Vec<ContentItem>,
    pagination: PageInfo,
}

#[debug_handler]
async fn gets(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let pagination = Pagination::new(query.page, query.limit, 20);
    let filter = ContentFilter {
        semester: query.semester,
        subject_code: query.subject_code,
        category: query.category,
        search: query.search,
    };
    let query_doc = filter.query()?;
    let total = state
        .mongo_db
        .repository::<Content>()
        .count_documents(query_doc.clone(), None)
        .await?;
    let content = state
        .mongo_db
        .repository::<Content>()
        .find(
            query_doc,
            MongoFindOptions::builder()
                .sort(filter.sort())
                .skip(pagination.skip())
                .limit(pagination.limit)
                .build(),
        )
        .await?
        .try_collect()
        .await?;
    Ok(Json(ListResponse {
        content: with_uploader_emails(&state, content).await?,
        pagination: pagination.info(total),
    }))
}

#[derive(Deserialize)]
struct CategoryQuery {
    category: Option<Category>,
}

#[derive(Serialize)]
struct Stats {
    total: usize,
    #[serde(rename = "byCategory")]
    by_category: BTreeMap<Category, usize>,
}

#[derive(Serialize)]
struct GroupedResponse {
    content: Vec<Content>,
    #[serde(rename = "groupedContent")]
    grouped_content: BTreeMap<Category, Vec<Content>>,
    stats: Stats,
}

#[debug_handler]
async fn gets_by_semester_subject(
    State(state): State<AppState>,
    Path((semester, code)): Path<(i32, String)>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<GroupedResponse>, AppError> {
    let mut query_doc = doc! {
        field!(semester in Content): semester,
        field!(subject_code in Content): code.to_uppercase(),
        field!(is_published in Content): true,
    };
    if let Some(category) = query.category {
        query_doc.insert(field!(category in Content), to_bson(&category)?);
    }
    let content: Vec<Content> = state
        .mongo_db
        .repository::<Content>()
        .find(
            query_doc,
            MongoFindOptions::builder()
                .sort(doc! { field!(created_at in Content): -1 })
                .build(),
        )
        .await?
        .try_collect()
        .await?;

    let grouped_content = group_by_category(content.clone());
    let stats = Stats {
        total: content.len(),
        by_category: grouped_content
            .iter()
            .map(|(category, items)| (*category, items.len()))
            .collect(),
    };
    Ok(Json(GroupedResponse {
        content,
        grouped_content,
        stats,
    }))
}

#[debug_handler]
async fn get(
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
) -> Result<Json<ContentItem>, AppError> {
    let res = find_content_by_id(&state, id).await?;
    let emails = common::admin_emails(&state.mongo_db, [res.uploaded_by]).await?;
    let uploaded_by_email = emails.get(&res.uploaded_by).cloned();
    Ok(Json(ContentItem {
        content: res,
        uploaded_by_email,
    }))
}

async fn find_content_by_id(state: &AppState, id: ObjectId) -> Result<Content, AppError> {
    let res = state
        .mongo_db
        .repository::<Content>()
        .find_one(
            doc! {
                "_id": id
            },
            None,
        )
        .await?
        .ok_or(AppError::NotFound(format!(
            "Content with id {} does not exist!",
            id
        )))?;
    Ok(res)
}

/// The counter bump is a single `$inc`; concurrent downloads must never
/// lose an update to a read-modify-write race.
#[debug_handler]
async fn download(
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
) -> Result<
    (
        TypedHeader<ContentDisposition>,
        TypedHeader<ContentLength>,
        TypedHeader<ContentType>,
        StreamBody<ReaderStream<tokio::fs::File>>,
    ),
    AppError,
> {
    let content = find_content_by_id(&state, id).await?;
    if !content.is_published {
        return Err(AppError::Forbidden("Content not available".to_string()));
    }
    let file = match state.files.open(&content.file_name).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    let length = file.metadata().await?.len();

    state
        .mongo_db
        .repository::<Content>()
        .update_one(
            doc! {
                "_id": id
            },
            doc! {
                Inc: {
                    field!(download_count in Content): 1
                }
            },
            None,
        )
        .await?;

    let content_disposition =
        ContentDisposition::decode(&mut std::iter::once(&HeaderValue::try_from(format!(
            "{}{}{}",
            common::DISPOSITION_PREFIX,
            content.file_name,
            common::DISPOSITION_SUFFIX
        ))?))?;
    let content_type = ContentType::from(
        mime::Mime::from_str(&content.file_type).unwrap_or(mime::APPLICATION_OCTET_STREAM),
    );

    Ok((
        TypedHeader(content_disposition),
        TypedHeader(ContentLength(length)),
        TypedHeader(content_type),
        StreamBody::new(ReaderStream::new(file)),
    ))
}

/// Text fields collected from the multipart form before validation.
#[derive(Default)]
struct ContentForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    semester: Option<String>,
    subject_code: Option<String>,
    tags: Option<String>,
    chapter: Option<String>,
    unit: Option<String>,
    is_published: Option<String>,
}

struct ContentMeta {
    title: String,
    description: Option<String>,
    category: Category,
    semester: i32,
    subject_code: String,
    tags: Vec<String>,
    chapter: Option<String>,
    unit: Option<String>,
    is_published: bool,
}

impl ContentForm {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = Some(value),
            "description" => self.description = Some(value),
            "category" => self.category = Some(value),
            "semester" => self.semester = Some(value),
            "subjectCode" => self.subject_code = Some(value),
            "tags" => self.tags = Some(value),
            "chapter" => self.chapter = Some(value),
            "unit" => self.unit = Some(value),
            "isPublished" => self.is_published = Some(value),
            _ => {}
        }
    }

    fn validate(self) -> Result<ContentMeta, AppError> {
        let mut errors = Vec::new();
        if self.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            errors.push("title: Title is required".to_string());
        }
        let category = match self.category.as_deref() {
            None => {
                errors.push("category: Category is required".to_string());
                None
            }
            Some(raw) => match Category::from_str(raw) {
                Ok(category) => Some(category),
                Err(e) => {
                    errors.push(format!("category: {e}"));
                    None
                }
            },
        };
        let semester = match self.semester.as_deref().map(str::parse::<i32>) {
            None => {
                errors.push("semester: Semester is required".to_string());
                None
            }
            Some(Err(_)) => {
                errors.push("semester: must be a number".to_string());
                None
            }
            Some(Ok(semester)) if !(1..=8).contains(&semester) => {
                errors.push("semester: must be between 1 and 8".to_string());
                None
            }
            Some(Ok(semester)) => Some(semester),
        };
        if self
            .subject_code
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
        {
            errors.push("subjectCode: Subject code is required".to_string());
        }
        let tags = match self.tags.as_deref() {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<String>>(raw) {
                Ok(tags) => tags,
                Err(_) => {
                    errors.push("tags: must be a JSON array of strings".to_string());
                    Vec::new()
                }
            },
        };
        let is_published = match self.is_published.as_deref() {
            None => true,
            Some(raw) => match raw.parse::<bool>() {
                Ok(flag) => flag,
                Err(_) => {
                    errors.push("isPublished: must be true or false".to_string());
                    true
                }
            },
        };
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        Ok(ContentMeta {
            title: self.title.unwrap_or_default(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            category: category.unwrap_or(Category::Notes),
            semester: semester.unwrap_or_default(),
            subject_code: self.subject_code.unwrap_or_default().to_uppercase(),
            tags,
            chapter: self.chapter.filter(|c| !c.trim().is_empty()),
            unit: self.unit.filter(|u| !u.trim().is_empty()),
            is_published,
        })
    }
}

struct StoredUpload {
    name: String,
    original_name: Option<String>,
    size: i64,
    content_type: String,
}

fn upload_error(err: UploadError) -> AppError {
    match err {
        UploadError::Io(err) => err.into(),
        other => AppError::BadRequest(other.to_string()),
    }
}

async fn read_fields(
    files: &FileStore,
    body: &mut Multipart,
    form: &mut ContentForm,
    stored: &mut Option<StoredUpload>,
) -> Result<(), AppError> {
    while let Some(mut field) = body.next_field().await.map_err(anyhow::Error::from)? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") if stored.is_none() => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                storage::check_file_type(&content_type).map_err(upload_error)?;
                let original_name = field.file_name().map(ToString::to_string);
                let file_name = FileStore::generate_name(
                    "file",
                    original_name.as_deref().unwrap_or_default(),
                );
                let size = files
                    .save(&file_name, &mut field)
                    .await
                    .map_err(upload_error)?;
                *stored = Some(StoredUpload {
                    name: file_name,
                    original_name,
                    size,
                    content_type,
                });
            }
            Some(name) => {
                let name = name.to_string();
                let value = field.text().await.map_err(anyhow::Error::from)?;
                form.set(&name, value);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Drains the form; if anything goes wrong after the file already landed
/// on disk (a truncated stream, a later field failing to read), the file
/// is removed before the error propagates.
async fn collect_upload(
    files: &FileStore,
    body: &mut Multipart,
) -> Result<(ContentForm, StoredUpload), AppError> {
    let mut form = ContentForm::default();
    let mut stored: Option<StoredUpload> = None;
    if let Err(err) = read_fields(files, body, &mut form, &mut stored).await {
        if let Some(stored) = &stored {
            let _ = files.remove(&stored.name).await;
        }
        return Err(err);
    }
    let stored = stored.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    Ok((form, stored))
}

/// The file lands on disk before the metadata is validated; every failure
/// after that point removes it again so a rejected upload leaves no orphan.
#[debug_handler]
async fn post(
    admin: AdminIdentity,
    State(state): State<AppState>,
    mut body: Multipart,
) -> Result<(StatusCode, Json<Content>), AppError> {
    let (form, stored) = collect_upload(&state.files, &mut body).await?;

    let res = insert_uploaded(&state, admin.id, form, &stored).await;
    match &res {
        Ok(_) => tracing::info!(admin = %admin.email, file = %stored.name, "content uploaded"),
        Err(_) => {
            let _ = state.files.remove(&stored.name).await;
        }
    }
    res
}

async fn insert_uploaded(
    state: &AppState,
    admin_id: ObjectId,
    form: ContentForm,
    stored: &StoredUpload,
) -> Result<(StatusCode, Json<Content>), AppError> {
    let meta = form.validate()?;
    let now = chrono::Utc::now();
    let content = Content {
        _id: ObjectId::new(),
        title: meta.title,
        description: meta.description,
        category: meta.category,
        semester: meta.semester,
        subject_code: meta.subject_code,
        file_name: stored.name.clone(),
        original_name: stored.original_name.clone(),
        file_size: stored.size,
        file_type: stored.content_type.clone(),
        download_count: 0,
        tags: meta.tags,
        chapter: meta.chapter,
        unit: meta.unit,
        is_published: meta.is_published,
        uploaded_by: admin_id,
        created_at: now,
        updated_at: now,
    };
    state
        .mongo_db
        .repository::<Content>()
        .insert_one(&content, None)
        .await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// Metadata-only partial update; `None` fields stay out of the `$set`
/// document so an omitted field means "leave unchanged". Bodies arrive
/// with camelCase names while the stored fields stay snake_case, hence
/// the deserialize-only renames.
#[derive(Serialize, Deserialize)]
struct ContentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    semester: Option<i32>,
    #[serde(
        default,
        rename(deserialize = "subjectCode"),
        skip_serializing_if = "Option::is_none"
    )]
    subject_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(
        default,
        rename(deserialize = "isPublished"),
        skip_serializing_if = "Option::is_none"
    )]
    is_published: Option<bool>,
}

impl ContentUpdate {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.push("title: Title is required".to_string());
        }
        if self.semester.is_some_and(|s| !(1..=8).contains(&s)) {
            errors.push("semester: must be between 1 and 8".to_string());
        }
        if self
            .subject_code
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            errors.push("subjectCode: Subject code is required".to_string());
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
    Json(body): Json<ContentUpdate>,
) -> Result<Json<Content>, AppError> {
    body.validate()?;
    let mut set = to_document(&body)?;
    if let Some(code) = &body.subject_code {
        set.insert(field!(subject_code in Content), code.to_uppercase());
    }
    set.insert(
        field!(updated_at in Content),
        to_bson(&chrono::Utc::now())?,
    );
    let res = state
        .mongo_db
        .repository::<Content>()
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
            "Content with id {} does not exist!",
            id
        )))?;
    Ok(Json(res))
}

/// The backing file goes first; a file that is already gone does not stop
/// the record from being deleted.
#[debug_handler]
async fn delete(
    _admin: AdminIdentity,
    State(state): State<AppState>,
    Path(id): Path<ObjectId>,
) -> Result<StatusCode, AppError> {
    let content = find_content_by_id(&state, id).await?;
    state.files.remove(&content.file_name).await?;
    state
        .mongo_db
        .repository::<Content>()
        .delete_one(
            doc! {
                "_id": id
            },
            None,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn new() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(gets).post(post))
        .route(
            "/semester/:semester/subject/:code",
            routing::get(gets_by_semester_subject),
        )
        .route("/:id", routing::get(get).put(put).delete(delete))
        .route("/:id/download", routing::get(download))
}
