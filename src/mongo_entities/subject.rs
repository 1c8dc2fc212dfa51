use mongodm::prelude::ObjectId;
use mongodm::{field, CollectionConfig, Index, IndexOption, Indexes, Model};
use serde::{Deserialize, Serialize};

/// A course in the eight-semester program. `code` is stored uppercased and
/// is the handle every other part of the system matches against; content
/// records refer to it by plain string equality, not by `_id`.
#[derive(utoipa::ToSchema)]
#[derive(Serialize, Deserialize)]
#[derive(Clone)]
pub(crate) struct Subject {
    #[serde(default)]
    pub(crate) _id: ObjectId,
    pub(crate) name: String,
    pub(crate) code: String,
    pub(crate) semester: i32,
    pub(crate) credit_hours: i32,
    pub(crate) lecture_hours: i32,
    #[serde(default)]
    pub(crate) tutorial_hours: i32,
    #[serde(default)]
    pub(crate) lab_hours: i32,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub(crate) updated_at: chrono::DateTime<chrono::Utc>,
}

impl CollectionConfig for Subject {
    fn collection_name() -> &'static str {
        "subjects"
    }

    fn indexes() -> Indexes {
        Indexes::new()
            .with(Index::new(field!(code in Subject)).with_option(IndexOption::Unique))
            .with(Index::new(field!(semester in Subject)))
    }
}

impl Model for Subject {
    type CollConf = Self;
}
