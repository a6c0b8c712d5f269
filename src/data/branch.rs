use crate::{
    data::{Document, Meta, non_empty, require, student::Student},
    error::RegistrarResult,
    store::{Collection, DocumentStore, Filter},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A study centre.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    #[serde(flatten)]
    pub meta: Meta,
    pub study_centre_name: String,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    pub study_centre_name: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchDetails {
    #[serde(flatten)]
    pub branch: Branch,
    pub student_count: u64,
    pub verified_students: u64,
    pub pending_admissions: u64,
}

impl Document for Branch {
    const COLLECTION: Collection = Collection::Branches;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require(
            "studyCentreName",
            &self.study_centre_name,
            "Please add a study centre name",
        )
    }
}

impl Branch {
    pub fn from_form(
        NewBranch {
            study_centre_name,
            place,
            district,
            image,
            phone,
            email,
        }: NewBranch,
    ) -> Self {
        Self {
            meta: Meta::new(),
            study_centre_name,
            place: non_empty(place),
            district: non_empty(district),
            image: non_empty(image),
            phone: non_empty(phone),
            email: non_empty(email),
        }
    }

    pub async fn get_all(store: &DocumentStore, sort: Option<&str>) -> RegistrarResult<Vec<Self>> {
        let filter = match sort {
            Some(field) => Filter::new().sorted_by(field),
            None => Filter::new(),
        };
        store.find(filter).await
    }

    ///follows an optional reference, a dangling one resolves to `None`
    pub async fn lookup(store: &DocumentStore, id: Option<Uuid>) -> RegistrarResult<Option<Self>> {
        match id {
            Some(id) => store.lookup(id).await,
            None => Ok(None),
        }
    }

    pub async fn get_details(store: &DocumentStore, id: Uuid) -> RegistrarResult<BranchDetails> {
        let branch: Self = store.find_by_id(id).await?;

        let (student_count, verified_students) = tokio::try_join!(
            store.count::<Student>(Filter::new().field_eq_id("branch", id)),
            store.count::<Student>(
                Filter::new()
                    .field_eq_id("branch", id)
                    .field_eq("verified", true)
            ),
        )?;

        Ok(BranchDetails {
            branch,
            student_count,
            verified_students,
            pending_admissions: student_count.saturating_sub(verified_students),
        })
    }
}
