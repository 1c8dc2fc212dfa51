use mongodm::prelude::ObjectId;
use mongodm::{field, CollectionConfig, Index, IndexOption, Indexes, Model};
use serde::{Deserialize, Serialize};

/// Created once through the setup operation and never deleted in-app.
/// Password material never leaves this module as JSON; handlers respond
/// with id and email only.
#[derive(Serialize, Deserialize)]
#[derive(Clone)]
pub(crate) struct Admin {
    #[serde(default)]
    pub(crate) _id: ObjectId,
    pub(crate) email: String,
    pub(crate) salt: [u8; 16],
    pub(crate) password_hash: Vec<u8>,
    #[serde(default)]
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub(crate) updated_at: chrono::DateTime<chrono::Utc>,
}

impl CollectionConfig for Admin {
    fn collection_name() -> &'static str {
        "admins"
    }

    fn indexes() -> Indexes {
        Indexes::new().with(Index::new(field!(email in Admin)).with_option(IndexOption::Unique))
    }
}

impl Model for Admin {
    type CollConf = Self;
}
