use crate::{
    error::{RegistrarResult, ValidationFailedSnafu},
    store::Collection,
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

pub mod branch;
pub mod cce;
pub mod course;
pub mod import;
pub mod student;
pub mod user;

/// Fields every stored document carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub id: Uuid,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Meta {
    pub fn new() -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    ///whether deletes only set a `deleted` flag that default reads then filter on
    const SOFT_DELETE: bool = false;

    fn meta(&self) -> &Meta;
    fn meta_mut(&mut self) -> &mut Meta;

    fn validate(&self) -> RegistrarResult<()> {
        Ok(())
    }
}

pub fn require(field: &'static str, value: &str, reason: &str) -> RegistrarResult<()> {
    snafu::ensure!(
        !value.trim().is_empty(),
        ValidationFailedSnafu { field, reason }
    );
    Ok(())
}

pub fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
