use mongodm::bson::Document;
use mongodm::mongo::IndexModel;
use mongodm::prelude::{MongoDatabase, ObjectId};
use mongodm::{doc, CollectionConfig};
use utoipa::openapi::{RefOr, Schema};

pub(crate) mod admin;
pub(crate) mod content;
pub(crate) mod notice;
pub(crate) mod subject;

/// Creates every declared index. The text index over content titles,
/// descriptions and tags cannot be expressed through `Indexes`, so it is
/// created against the raw collection handle.
pub(crate) async fn sync(db: &MongoDatabase) -> anyhow::Result<()> {
    mongodm::sync_indexes::<admin::Admin>(db).await?;
    mongodm::sync_indexes::<subject::Subject>(db).await?;
    mongodm::sync_indexes::<content::Content>(db).await?;
    mongodm::sync_indexes::<notice::Notice>(db).await?;
    db.collection::<Document>(content::Content::collection_name())
        .create_index(
            IndexModel::builder()
                .keys(doc! {
                    "title": "text",
                    "description": "text",
                    "tags": "text"
                })
                .build(),
            None,
        )
        .await?;
    Ok(())
}

pub(crate) struct ObjectIdDef;

impl<'__s> utoipa::ToSchema<'__s> for ObjectIdDef {
    fn schema() -> (&'__s str, RefOr<Schema>) {
        let pattern = regex::Regex::new(r"^[0-9a-f]{24}$").unwrap();
        let example = ObjectId::new().to_hex();
        assert!(pattern.is_match(&example));
        (
            "ObjectId",
            utoipa::openapi::ObjectBuilder::new()
                .property(
                    "$oid",
                    utoipa::openapi::ObjectBuilder::new()
                        .schema_type(utoipa::openapi::SchemaType::String)
                        .description(Some(
                            "ObjectId values are 12 bytes in length, written as hex strings.",
                        ))
                        .max_length(Some(24))
                        .min_length(Some(24))
                        .pattern(Some(pattern.as_str()))
                        .example(Some(example.into())),
                )
                .required("$oid")
                .into(),
        )
    }
}
