use crate::{
    data::Document,
    error::{DecodeDocumentSnafu, EncodeDocumentSnafu, NotFoundSnafu, RegistrarResult},
};
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub const DELETED_FIELD: &str = "deleted";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Students,
    Branches,
    Courses,
    Users,
    Classes,
    Subjects,
    Exams,
    CceResults,
}

impl Collection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Branches => "branches",
            Self::Courses => "courses",
            Self::Users => "users",
            Self::Classes => "classes",
            Self::Subjects => "subjects",
            Self::Exams => "exams",
            Self::CceResults => "cce_results",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
}

impl Condition {
    fn matches(&self, document: &Value) -> bool {
        match self {
            Self::Eq(field, value) => document.get(field) == Some(value),
            //a missing field is never equal to anything, so it passes
            Self::Ne(field, value) => document.get(field) != Some(value),
        }
    }
}

/// A conjunction of field conditions over top-level document fields, with an optional sort.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
    sort_by: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn field_ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Ne(field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn field_eq_id(self, field: impl Into<String>, id: Uuid) -> Self {
        self.field_eq(field, id.to_string())
    }

    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sort_by(&self) -> Option<&str> {
        self.sort_by.as_deref()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }

    /// Ordering used by backends that sort in memory, close to `ORDER BY body ->> field` under
    /// a linguistic collation such as `en_US.UTF-8`: case is ignored first and only breaks ties.
    /// A database created with the `C` collation sorts by bytes instead, so uppercase names
    /// come first there.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let Some(field) = self.sort_by.as_deref() else {
            return Ordering::Equal;
        };

        let key = |v: &Value| match v.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        //postgres puts NULLs last in ascending order
        match (key(a), key(b)) {
            (Some(a), Some(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(&b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    #[default]
    Live,
    IncludeDeleted,
}

/// Raw JSON persistence. Backends know nothing about soft deletes or typing.
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    async fn find(&self, collection: Collection, filter: &Filter) -> RegistrarResult<Vec<Value>>;
    async fn find_by_id(&self, collection: Collection, id: Uuid) -> RegistrarResult<Option<Value>>;
    async fn count(&self, collection: Collection, filter: &Filter) -> RegistrarResult<u64>;
    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> RegistrarResult<()>;
    ///returns whether a document was replaced
    async fn replace(&self, collection: Collection, id: Uuid, document: Value)
    -> RegistrarResult<bool>;
    ///returns whether a document was removed
    async fn remove(&self, collection: Collection, id: Uuid) -> RegistrarResult<bool>;

    async fn close(&self) {}
}

/// Typed access to every collection.
///
/// Reads on collections whose [`Document::SOFT_DELETE`] is set get `deleted != true` appended
/// to their filter here, before the backend ever sees it. Only [`ReadPolicy::IncludeDeleted`]
/// skips that.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
}

impl DocumentStore {
    pub fn new(backend: impl DocumentBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(memory::MemoryBackend::default())
    }

    fn read_filter<D: Document>(filter: Filter, policy: ReadPolicy) -> Filter {
        if D::SOFT_DELETE && policy == ReadPolicy::Live {
            filter.field_ne(DELETED_FIELD, true)
        } else {
            filter
        }
    }

    fn decode<D: Document>(value: Value) -> RegistrarResult<D> {
        serde_json::from_value(value).context(DecodeDocumentSnafu {
            collection: D::COLLECTION,
        })
    }

    fn encode<D: Document>(document: &D) -> RegistrarResult<Value> {
        serde_json::to_value(document).context(EncodeDocumentSnafu {
            collection: D::COLLECTION,
        })
    }

    pub async fn find<D: Document>(&self, filter: Filter) -> RegistrarResult<Vec<D>> {
        self.find_with(filter, ReadPolicy::Live).await
    }

    pub async fn find_with<D: Document>(
        &self,
        filter: Filter,
        policy: ReadPolicy,
    ) -> RegistrarResult<Vec<D>> {
        let filter = Self::read_filter::<D>(filter, policy);
        self.backend
            .find(D::COLLECTION, &filter)
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub async fn find_by_id<D: Document>(&self, id: Uuid) -> RegistrarResult<D> {
        self.find_by_id_with(id, ReadPolicy::Live).await
    }

    pub async fn find_by_id_with<D: Document>(
        &self,
        id: Uuid,
        policy: ReadPolicy,
    ) -> RegistrarResult<D> {
        self.lookup_with(id, policy).await?.context(NotFoundSnafu {
            collection: D::COLLECTION,
            id,
        })
    }

    ///`Ok(None)` on a miss, for following references that may dangle
    pub async fn lookup<D: Document>(&self, id: Uuid) -> RegistrarResult<Option<D>> {
        self.lookup_with(id, ReadPolicy::Live).await
    }

    async fn lookup_with<D: Document>(
        &self,
        id: Uuid,
        policy: ReadPolicy,
    ) -> RegistrarResult<Option<D>> {
        let filter = Self::read_filter::<D>(Filter::new(), policy);
        match self.backend.find_by_id(D::COLLECTION, id).await? {
            Some(found) if filter.matches(&found) => Self::decode(found).map(Some),
            _ => Ok(None),
        }
    }

    pub async fn count<D: Document>(&self, filter: Filter) -> RegistrarResult<u64> {
        let filter = Self::read_filter::<D>(filter, ReadPolicy::Live);
        self.backend.count(D::COLLECTION, &filter).await
    }

    pub async fn create<D: Document>(&self, document: D) -> RegistrarResult<D> {
        document.validate()?;

        let id = document.meta().id;
        self.backend
            .insert(D::COLLECTION, id, Self::encode(&document)?)
            .await?;
        debug!(collection = %D::COLLECTION, %id, "Created document");

        Ok(document)
    }

    pub async fn update<D: Document>(&self, mut document: D) -> RegistrarResult<D> {
        document.validate()?;
        document.meta_mut().updated_at = Timestamp::now();

        let id = document.meta().id;
        let replaced = self
            .backend
            .replace(D::COLLECTION, id, Self::encode(&document)?)
            .await?;
        snafu::ensure!(
            replaced,
            NotFoundSnafu {
                collection: D::COLLECTION,
                id
            }
        );

        Ok(document)
    }

    ///soft-deletes on soft-delete collections, removes the document otherwise
    pub async fn delete<D: Document>(&self, id: Uuid) -> RegistrarResult<()> {
        if D::SOFT_DELETE {
            return self.set_deleted_flag::<D>(id, true).await;
        }

        let removed = self.backend.remove(D::COLLECTION, id).await?;
        snafu::ensure!(
            removed,
            NotFoundSnafu {
                collection: D::COLLECTION,
                id
            }
        );
        debug!(collection = %D::COLLECTION, %id, "Removed document");
        Ok(())
    }

    pub async fn restore<D: Document>(&self, id: Uuid) -> RegistrarResult<D> {
        self.set_deleted_flag::<D>(id, false).await?;
        self.find_by_id(id).await
    }

    async fn set_deleted_flag<D: Document>(&self, id: Uuid, deleted: bool) -> RegistrarResult<()> {
        let mut raw = self
            .backend
            .find_by_id(D::COLLECTION, id)
            .await?
            .context(NotFoundSnafu {
                collection: D::COLLECTION,
                id,
            })?;

        if let Value::Object(fields) = &mut raw {
            fields.insert(DELETED_FIELD.to_string(), Value::Bool(deleted));
            fields.insert(
                "updatedAt".to_string(),
                Value::String(Timestamp::now().to_string()),
            );
        }
        self.backend.replace(D::COLLECTION, id, raw).await?;
        info!(collection = %D::COLLECTION, %id, deleted, "Changed soft-delete flag");

        Ok(())
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{
            Meta,
            branch::Branch,
            course::{Course, NewCourse},
        },
        error::RegistrarError,
    };

    fn course(title: &str) -> Course {
        Course::from_form(NewCourse {
            course_title: title.to_string(),
            duration: "6 months".to_string(),
            amount: "1500".to_string(),
            image: "course.png".to_string(),
            details: "details".to_string(),
            description: "description".to_string(),
        })
    }

    #[tokio::test]
    async fn soft_deleted_courses_never_reach_default_reads() {
        let store = DocumentStore::in_memory();
        let kept = store.create(course("Arabic")).await.unwrap();
        let gone = store.create(course("Urdu")).await.unwrap();
        store.delete::<Course>(gone.meta.id).await.unwrap();

        let filters = [
            Filter::new(),
            Filter::new().field_eq(DELETED_FIELD, true),
            Filter::new().field_eq("courseTitle", "Urdu"),
            Filter::new().sorted_by("courseTitle"),
        ];
        for filter in filters {
            let found = store.find::<Course>(filter).await.unwrap();
            assert!(found.iter().all(|c| !c.deleted));
        }

        assert_eq!(store.count::<Course>(Filter::new()).await.unwrap(), 1);
        assert!(matches!(
            store.find_by_id::<Course>(gone.meta.id).await,
            Err(RegistrarError::NotFound { .. })
        ));
        assert_eq!(
            store
                .find_by_id::<Course>(kept.meta.id)
                .await
                .unwrap()
                .course_title,
            "Arabic"
        );
    }

    #[tokio::test]
    async fn include_deleted_and_restore_recover_courses() {
        let store = DocumentStore::in_memory();
        let gone = store.create(course("Urdu")).await.unwrap();
        store.delete::<Course>(gone.meta.id).await.unwrap();

        let everything = store
            .find_with::<Course>(Filter::new(), ReadPolicy::IncludeDeleted)
            .await
            .unwrap();
        assert_eq!(everything.len(), 1);
        assert!(everything[0].deleted);

        let restored = store.restore::<Course>(gone.meta.id).await.unwrap();
        assert!(!restored.deleted);
        assert_eq!(store.find::<Course>(Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hard_delete_reports_missing_documents() {
        let store = DocumentStore::in_memory();
        let branch = store
            .create(Branch {
                meta: Meta::new(),
                study_centre_name: "Kottakkal".to_string(),
                place: None,
                district: None,
                image: None,
                phone: None,
                email: None,
            })
            .await
            .unwrap();

        store.delete::<Branch>(branch.meta.id).await.unwrap();
        assert!(matches!(
            store.delete::<Branch>(branch.meta.id).await,
            Err(RegistrarError::NotFound {
                collection: Collection::Branches,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn validation_failures_are_typed() {
        let store = DocumentStore::in_memory();
        match store.create(course("   ")).await {
            Err(RegistrarError::ValidationFailed { field, reason }) => {
                assert_eq!(field, "courseTitle");
                assert_eq!(reason, "Please add a course title");
            }
            other => panic!("expected a validation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sorting_ignores_case_before_breaking_ties() {
        let store = DocumentStore::in_memory();
        for name in ["Tirur", "areekode", "Beypore", "tirur"] {
            store
                .create(Branch {
                    meta: Meta::new(),
                    study_centre_name: name.to_string(),
                    place: None,
                    district: None,
                    image: None,
                    phone: None,
                    email: None,
                })
                .await
                .unwrap();
        }

        let sorted: Vec<String> = store
            .find::<Branch>(Filter::new().sorted_by("studyCentreName"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.study_centre_name)
            .collect();
        assert_eq!(sorted, ["areekode", "Beypore", "Tirur", "tirur"]);
    }

    #[test]
    fn ne_conditions_pass_missing_fields() {
        let filter = Filter::new().field_ne(DELETED_FIELD, true);
        assert!(filter.matches(&serde_json::json!({"courseTitle": "x"})));
        assert!(filter.matches(&serde_json::json!({"deleted": false})));
        assert!(!filter.matches(&serde_json::json!({"deleted": true})));
    }
}
