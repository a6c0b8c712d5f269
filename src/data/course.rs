use crate::{
    data::{Document, Meta, require},
    error::RegistrarResult,
    store::{Collection, DocumentStore, Filter, ReadPolicy},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A course on offer. Deleting one only sets `deleted`, see [`Document::SOFT_DELETE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(flatten)]
    pub meta: Meta,
    pub course_title: String,
    pub duration: String,
    pub amount: String,
    pub image: String,
    pub details: String,
    pub description: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub course_title: String,
    pub duration: String,
    pub amount: String,
    pub image: String,
    pub details: String,
    pub description: String,
}

impl Document for Course {
    const COLLECTION: Collection = Collection::Courses;
    const SOFT_DELETE: bool = true;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("courseTitle", &self.course_title, "Please add a course title")?;
        require("duration", &self.duration, "Please add a duration")?;
        require("amount", &self.amount, "Please add an amount")?;
        require("image", &self.image, "Please upload an image")?;
        require("details", &self.details, "Please add course details")?;
        require("description", &self.description, "Please add course details")
    }
}

impl Course {
    pub fn from_form(
        NewCourse {
            course_title,
            duration,
            amount,
            image,
            details,
            description,
        }: NewCourse,
    ) -> Self {
        Self {
            meta: Meta::new(),
            course_title,
            duration,
            amount,
            image,
            details,
            description,
            deleted: false,
        }
    }

    pub async fn get_all(store: &DocumentStore, policy: ReadPolicy) -> RegistrarResult<Vec<Self>> {
        store.find_with(Filter::new(), policy).await
    }

    pub async fn remove(store: &DocumentStore, id: Uuid) -> RegistrarResult<()> {
        store.delete::<Self>(id).await
    }

    pub async fn restore(store: &DocumentStore, id: Uuid) -> RegistrarResult<Self> {
        store.restore(id).await
    }
}
