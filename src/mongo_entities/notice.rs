use mongodm::bson::{to_bson, Bson, Document};
use mongodm::prelude::ObjectId;
use mongodm::{doc, field, CollectionConfig, Index, Indexes, Model};
use serde::{Deserialize, Serialize};

#[derive(utoipa::ToSchema)]
#[derive(Serialize, Deserialize)]
#[derive(Clone, Copy)]
#[derive(Eq, PartialEq)]
#[derive(Debug)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum NoticeType {
    #[default]
    General,
    Exam,
    Assignment,
    Event,
    Urgent,
}

fn default_published() -> bool {
    true
}

/// An announcement targeted at zero or more semesters; an empty
/// `target_semesters` list addresses everyone.
#[derive(utoipa::ToSchema)]
#[derive(Serialize, Deserialize)]
#[derive(Clone)]
pub(crate) struct Notice {
    #[serde(default)]
    pub(crate) _id: ObjectId,
    pub(crate) title: String,
    pub(crate) content: String,
    #[serde(rename = "type", default)]
    pub(crate) kind: NoticeType,
    #[serde(default)]
    pub(crate) target_semesters: Vec<i32>,
    #[serde(default)]
    pub(crate) is_urgent: bool,
    #[serde(default = "default_published")]
    pub(crate) is_published: bool,
    #[serde(default)]
    pub(crate) publish_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub(crate) expiry_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub(crate) created_by: ObjectId,
    #[serde(default)]
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub(crate) updated_at: chrono::DateTime<chrono::Utc>,
}

impl CollectionConfig for Notice {
    fn collection_name() -> &'static str {
        "notices"
    }

    fn indexes() -> Indexes {
        Indexes::new()
            .with(Index::new(field!(publish_date in Notice)).with_key(field!(is_published in Notice)))
            .with(
                Index::new(field!(target_semesters in Notice))
                    .with_key(field!(is_published in Notice)),
            )
    }
}

impl Model for Notice {
    type CollConf = Self;
}

impl Notice {
    /// The visibility invariant: published, publish date reached (or unset),
    /// expiry strictly in the future (or unset).
    pub(crate) fn visible_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_published
            && self.publish_date.map_or(true, |date| date <= now)
            && self.expiry_date.map_or(true, |date| date > now)
    }

    pub(crate) fn targets_semester(&self, semester: i32) -> bool {
        self.target_semesters.is_empty() || self.target_semesters.contains(&semester)
    }
}

/// Public listing filter over visible notices. The admin listing does not go
/// through this type at all; it reads the collection unfiltered.
#[derive(Debug, Default)]
pub(crate) struct NoticeFilter {
    pub(crate) semester: Option<i32>,
    pub(crate) kind: Option<NoticeType>,
    pub(crate) urgent_only: bool,
}

impl NoticeFilter {
    /// Unset dates are stored as nulls, hence the null arms next to the
    /// range comparisons.
    pub(crate) fn query(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Document, mongodm::bson::ser::Error> {
        let now = to_bson(&now)?;
        let mut query = doc! {
            field!(is_published in Notice): true,
            "$and": [
                { "$or": [
                    { field!(publish_date in Notice): { "$lte": now.clone() } },
                    { field!(publish_date in Notice): Bson::Null },
                ] },
                { "$or": [
                    { field!(expiry_date in Notice): { "$gt": now } },
                    { field!(expiry_date in Notice): Bson::Null },
                ] },
            ],
        };
        if self.urgent_only {
            query.insert(field!(is_urgent in Notice), true);
        }
        if let Some(semester) = self.semester {
            query.insert(
                "$or",
                vec![
                    doc! { field!(target_semesters in Notice): { "$size": 0 } },
                    doc! { field!(target_semesters in Notice): semester },
                ],
            );
        }
        if let Some(kind) = self.kind {
            query.insert("type", to_bson(&kind)?);
        }
        Ok(query)
    }

    /// Urgency trumps everything, then the most recently published.
    pub(crate) fn sort() -> Document {
        doc! {
            field!(is_urgent in Notice): -1,
            field!(publish_date in Notice): -1,
            field!(created_at in Notice): -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn notice() -> Notice {
        Notice {
            _id: ObjectId::new(),
            title: "t".to_string(),
            content: "c".to_string(),
            kind: NoticeType::General,
            target_semesters: Vec::new(),
            is_urgent: false,
            is_published: true,
            publish_date: None,
            expiry_date: None,
            created_by: ObjectId::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn unpublished_is_never_visible() {
        let now = chrono::Utc::now();
        let mut n = notice();
        n.is_published = false;
        assert!(!n.visible_at(now));
    }

    #[test]
    fn unset_dates_are_visible() {
        assert!(notice().visible_at(chrono::Utc::now()));
    }

    #[test]
    fn publish_date_boundary_is_inclusive() {
        let now = chrono::Utc::now();
        let mut n = notice();
        n.publish_date = Some(now);
        assert!(n.visible_at(now));
        n.publish_date = Some(now + Duration::seconds(1));
        assert!(!n.visible_at(now));
        n.publish_date = Some(now - Duration::hours(1));
        assert!(n.visible_at(now));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = chrono::Utc::now();
        let mut n = notice();
        n.expiry_date = Some(now);
        assert!(!n.visible_at(now));
        n.expiry_date = Some(now + Duration::seconds(1));
        assert!(n.visible_at(now));
        n.expiry_date = Some(now - Duration::hours(1));
        assert!(!n.visible_at(now));
    }

    #[test]
    fn empty_target_list_addresses_every_semester() {
        let mut n = notice();
        assert!(n.targets_semester(1));
        assert!(n.targets_semester(8));
        n.target_semesters = vec![3];
        assert!(n.targets_semester(3));
        assert!(!n.targets_semester(4));
    }

    #[test]
    fn base_query_carries_the_visibility_clauses() {
        let query = NoticeFilter::default().query(chrono::Utc::now()).unwrap();
        assert!(query.get_bool("is_published").unwrap());
        let clauses = query.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(query.get("$or").is_none());
        assert!(query.get("is_urgent").is_none());
    }

    #[test]
    fn semester_filter_adds_the_targeting_disjunction() {
        let query = NoticeFilter {
            semester: Some(3),
            ..Default::default()
        }
        .query(chrono::Utc::now())
        .unwrap();
        let arms = query.get_array("$or").unwrap();
        assert_eq!(arms.len(), 2);
    }

    #[test]
    fn type_and_urgency_filters_apply() {
        let query = NoticeFilter {
            kind: Some(NoticeType::Exam),
            urgent_only: true,
            ..Default::default()
        }
        .query(chrono::Utc::now())
        .unwrap();
        assert_eq!(query.get_str("type").unwrap(), "exam");
        assert!(query.get_bool("is_urgent").unwrap());
    }

    #[test]
    fn sort_ranks_urgency_then_publish_date_then_creation() {
        let sort = NoticeFilter::sort();
        let keys: Vec<_> = sort.keys().map(String::as_str).collect();
        assert_eq!(keys, ["is_urgent", "publish_date", "created_at"]);
    }
}
