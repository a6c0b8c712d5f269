use crate::{
    auth::PermissionsTarget,
    data::{Document, Meta, branch::Branch, non_empty, require},
    error::{BcryptSnafu, JoinTaskSnafu, RegistrarResult, ValidationFailedSnafu},
    store::{Collection, DocumentStore, Filter},
};
use bcrypt::DEFAULT_COST;
use email_address::EmailAddress;
use rand::{Rng, distr::Alphanumeric, rng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "superAdmin")]
    SuperAdmin,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "superAdmin",
            Self::Admin => "admin",
        }
    }

    pub fn permissions(self) -> PermissionsTarget {
        match self {
            Self::SuperAdmin => PermissionsTarget::all(),
            Self::Admin => {
                PermissionsTarget::all()
                    - PermissionsTarget::CRUD_BRANCHES
                    - PermissionsTarget::CRUD_USERS
                    - PermissionsTarget::CRUD_COURSES
                    - PermissionsTarget::RECOVER_DELETED
                    - PermissionsTarget::MANAGE_EXAMS
                    - PermissionsTarget::TRANSFER_STUDENTS
            }
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::error::RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superAdmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            other => ValidationFailedSnafu {
                field: "role",
                reason: format!("unknown role {other:?}"),
            }
            .fail(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: Meta,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch: Option<Uuid>,
    ///stored, but cleared before a user is handed to a client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub branch: Option<Uuid>,
    ///one is generated when absent
    pub password: Option<SecretString>,
}

impl Document for User {
    const COLLECTION: Collection = Collection::Users;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("username", &self.username, "Please add a username")?;
        if let Err(e) = EmailAddress::from_str(&self.email) {
            return ValidationFailedSnafu {
                field: "email",
                reason: e.to_string(),
            }
            .fail();
        }

        match (self.role, self.branch) {
            (Role::Admin, None) => ValidationFailedSnafu {
                field: "branch",
                reason: "Admins must belong to a study centre",
            }
            .fail(),
            (Role::SuperAdmin, Some(_)) => ValidationFailedSnafu {
                field: "branch",
                reason: "Super admins are not tied to a study centre",
            }
            .fail(),
            _ => Ok(()),
        }
    }
}

fn generate_password() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

impl User {
    ///returns the generated password alongside the user when none was given
    pub async fn insert_into_database(
        store: &DocumentStore,
        NewUser {
            username,
            email,
            phone,
            role,
            branch,
            password,
        }: NewUser,
    ) -> RegistrarResult<(Self, Option<SecretString>)> {
        if let Some(branch) = branch {
            store.find_by_id::<Branch>(branch).await?;
        }

        let (password, generated) = match password {
            Some(password) => (password, None),
            None => {
                let generated = generate_password();
                (
                    SecretString::from(generated.clone()),
                    Some(SecretString::from(generated)),
                )
            }
        };

        let password_hash = tokio::task::spawn_blocking(move || {
            bcrypt::hash(password.expose_secret().as_bytes(), DEFAULT_COST)
        })
        .await
        .context(JoinTaskSnafu)?
        .context(BcryptSnafu)?;

        let user = store
            .create(Self {
                meta: Meta::new(),
                username: username.trim().to_string(),
                email: email.trim().to_string(),
                phone: non_empty(phone),
                role,
                branch,
                password_hash: Some(password_hash),
            })
            .await?;
        info!(id = %user.meta.id, %role, "Created user");

        Ok((user, generated))
    }

    pub async fn get_all(store: &DocumentStore) -> RegistrarResult<Vec<Self>> {
        store.find(Filter::new()).await
    }

    ///everyone except super admins
    pub async fn get_all_staff(store: &DocumentStore) -> RegistrarResult<Vec<Self>> {
        store
            .find(Filter::new().field_ne("role", Role::SuperAdmin.as_str()))
            .await
    }

    pub async fn remove_from_database(store: &DocumentStore, id: Uuid) -> RegistrarResult<Self> {
        let user: Self = store.find_by_id(id).await?;
        store.delete::<Self>(id).await?;
        warn!(%id, "Deleted user");
        Ok(user)
    }
}
