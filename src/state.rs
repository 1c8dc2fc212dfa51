use std::sync::Arc;

use crate::routes::common::auth::JwtKeys;
use crate::storage::FileStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) mongo_db: mongodm::prelude::MongoDatabase,
    pub(crate) jwt: Arc<JwtKeys>,
    pub(crate) files: Arc<FileStore>,
    pub(crate) hash_cost: u8,
}
