use std::collections::HashMap;

use futures_util::TryStreamExt;
use mongodm::prelude::{MongoDatabase, ObjectId};
use mongodm::{doc, ToRepository};

use crate::mongo_entities::admin::Admin;

pub(crate) mod auth;
pub(crate) mod err;
pub(crate) mod query;

pub(crate) const DISPOSITION_PREFIX: &str = "attachment; filename=\"";
pub(crate) const DISPOSITION_SUFFIX: &str = "\"";

/// Resolves author ids to emails in one batched query; unknown ids (a
/// deleted admin) simply stay out of the map.
pub(crate) async fn admin_emails(
    db: &MongoDatabase,
    ids: impl IntoIterator<Item = ObjectId>,
) -> Result<HashMap<ObjectId, String>, err::AppError> {
    let ids: Vec<_> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let admins: Vec<Admin> = db
        .repository::<Admin>()
        .find(
            doc! {
                "_id": { "$in": ids }
            },
            None,
        )
        .await?
        .try_collect()
        .await?;
    Ok(admins
        .into_iter()
        .map(|admin| (admin._id, admin.email))
        .collect())
}
