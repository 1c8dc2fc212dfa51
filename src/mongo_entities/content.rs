use std::collections::BTreeMap;
use std::str::FromStr;

use mongodm::bson::{to_bson, Document};
use mongodm::prelude::ObjectId;
use mongodm::{doc, field, CollectionConfig, Index, Indexes, Model};
use serde::{Deserialize, Serialize};

#[derive(utoipa::ToSchema)]
#[derive(Serialize, Deserialize)]
#[derive(Clone, Copy)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Debug)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Category {
    Notes,
    PastPapers,
    HandwrittenNotes,
    ImportantQuestions,
    Assignments,
    LabReports,
    Syllabus,
    ReferenceMaterials,
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notes" => Ok(Self::Notes),
            "past_papers" => Ok(Self::PastPapers),
            "handwritten_notes" => Ok(Self::HandwrittenNotes),
            "important_questions" => Ok(Self::ImportantQuestions),
            "assignments" => Ok(Self::Assignments),
            "lab_reports" => Ok(Self::LabReports),
            "syllabus" => Ok(Self::Syllabus),
            "reference_materials" => Ok(Self::ReferenceMaterials),
            other => Err(format!("Unknown category {other}!")),
        }
    }
}

fn default_published() -> bool {
    true
}

/// A study material bound to one stored file. `subject_code` deliberately
/// carries no relational integrity against `Subject.code`; the two are
/// matched by uppercased string equality wherever they meet.
#[derive(utoipa::ToSchema)]
#[derive(Serialize, Deserialize)]
#[derive(Clone)]
pub(crate) struct Content {
    #[serde(default)]
    pub(crate) _id: ObjectId,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) category: Category,
    pub(crate) semester: i32,
    pub(crate) subject_code: String,
    pub(crate) file_name: String,
    #[serde(default)]
    pub(crate) original_name: Option<String>,
    pub(crate) file_size: i64,
    pub(crate) file_type: String,
    #[serde(default)]
    pub(crate) download_count: i64,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) chapter: Option<String>,
    #[serde(default)]
    pub(crate) unit: Option<String>,
    #[serde(default = "default_published")]
    pub(crate) is_published: bool,
    #[serde(default)]
    pub(crate) uploaded_by: ObjectId,
    #[serde(default)]
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub(crate) updated_at: chrono::DateTime<chrono::Utc>,
}

impl CollectionConfig for Content {
    fn collection_name() -> &'static str {
        "contents"
    }

    fn indexes() -> Indexes {
        Indexes::new()
            .with(
                Index::new(field!(semester in Content))
                    .with_key(field!(subject_code in Content))
                    .with_key(field!(category in Content)),
            )
            .with(Index::new(field!(subject_code in Content)))
    }
}

impl Model for Content {
    type CollConf = Self;
}

/// Public listing filter. An omitted field leaves the query unconstrained;
/// only `is_published: true` is always present.
#[derive(Debug, Default)]
pub(crate) struct ContentFilter {
    pub(crate) semester: Option<i32>,
    pub(crate) subject_code: Option<String>,
    pub(crate) category: Option<Category>,
    pub(crate) search: Option<String>,
}

impl ContentFilter {
    pub(crate) fn query(&self) -> Result<Document, mongodm::bson::ser::Error> {
        let mut query = doc! { field!(is_published in Content): true };
        if let Some(semester) = self.semester {
            query.insert(field!(semester in Content), semester);
        }
        if let Some(code) = &self.subject_code {
            query.insert(field!(subject_code in Content), code.to_uppercase());
        }
        if let Some(category) = self.category {
            query.insert(field!(category in Content), to_bson(&category)?);
        }
        if let Some(search) = &self.search {
            query.insert("$text", doc! { "$search": search });
        }
        Ok(query)
    }

    /// Relevance first when a text search is in play, recency otherwise.
    pub(crate) fn sort(&self) -> Document {
        if self.search.is_some() {
            doc! { "score": { "$meta": "textScore" } }
        } else {
            doc! { field!(created_at in Content): -1 }
        }
    }
}

/// Buckets an already-ordered listing by category, keeping the incoming
/// order inside each bucket.
pub(crate) fn group_by_category(items: Vec<Content>) -> BTreeMap<Category, Vec<Content>> {
    let mut groups: BTreeMap<Category, Vec<Content>> = BTreeMap::new();
    for item in items {
        groups.entry(item.category).or_default().push(item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, category: Category) -> Content {
        Content {
            _id: ObjectId::new(),
            title: title.to_string(),
            description: None,
            category,
            semester: 3,
            subject_code: "CS101".to_string(),
            file_name: "file-0-0.pdf".to_string(),
            original_name: None,
            file_size: 1,
            file_type: "application/pdf".to_string(),
            download_count: 0,
            tags: Vec::new(),
            chapter: None,
            unit: None,
            is_published: true,
            uploaded_by: ObjectId::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn empty_filter_only_constrains_published() {
        let query = ContentFilter::default().query().unwrap();
        assert!(query.get_bool("is_published").unwrap());
        assert_eq!(query.len(), 1);
    }

    #[test]
    fn subject_code_is_uppercased() {
        let query = ContentFilter {
            subject_code: Some("cs101".to_string()),
            ..Default::default()
        }
        .query()
        .unwrap();
        assert_eq!(query.get_str("subject_code").unwrap(), "CS101");
    }

    #[test]
    fn set_fields_all_land_in_the_query() {
        let query = ContentFilter {
            semester: Some(5),
            subject_code: Some("MTH202".to_string()),
            category: Some(Category::PastPapers),
            search: Some("fourier".to_string()),
        }
        .query()
        .unwrap();
        assert_eq!(query.get_i32("semester").unwrap(), 5);
        assert_eq!(query.get_str("subject_code").unwrap(), "MTH202");
        assert_eq!(query.get_str("category").unwrap(), "past_papers");
        assert_eq!(
            query
                .get_document("$text")
                .unwrap()
                .get_str("$search")
                .unwrap(),
            "fourier"
        );
    }

    #[test]
    fn sort_switches_on_search() {
        let by_recency = ContentFilter::default().sort();
        assert_eq!(by_recency.get_i32("created_at").unwrap(), -1);

        let by_score = ContentFilter {
            search: Some("laplace".to_string()),
            ..Default::default()
        }
        .sort();
        assert!(by_score.get_document("score").is_ok());
    }

    #[test]
    fn grouping_preserves_order_and_counts() {
        let items = vec![
            item("a", Category::Notes),
            item("b", Category::Syllabus),
            item("c", Category::Notes),
        ];
        let groups = group_by_category(items);
        assert_eq!(groups.len(), 2);
        let notes = &groups[&Category::Notes];
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].title, "a");
        assert_eq!(notes[1].title, "c");
        assert_eq!(groups[&Category::Syllabus].len(), 1);

        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn category_round_trips_through_from_str() {
        for name in [
            "notes",
            "past_papers",
            "handwritten_notes",
            "important_questions",
            "assignments",
            "lab_reports",
            "syllabus",
            "reference_materials",
        ] {
            let category = Category::from_str(name).unwrap();
            assert_eq!(to_bson(&category).unwrap().as_str().unwrap(), name);
        }
        assert!(Category::from_str("videos").is_err());
    }
}
