use crate::{
    auth::RoleScope,
    data::{Document, Meta, branch::Branch, cce::Class, non_empty, require},
    error::{RegistrarResult, ValidationFailedSnafu},
    store::{Collection, DocumentStore, Filter},
};
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(flatten)]
    pub meta: Meta,
    pub student_name: String,
    pub register_no: String,
    #[serde(default)]
    pub admission_no: Option<String>,
    #[serde(default)]
    pub aadhar: Option<String>,
    #[serde(default)]
    pub class: Option<Uuid>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub house_name: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dob: Option<Date>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub post_office: Option<String>,
    #[serde(default)]
    pub pin_code: Option<String>,
    #[serde(default)]
    pub branch: Option<Uuid>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub student_name: String,
    pub register_no: String,
    #[serde(default)]
    pub admission_no: String,
    #[serde(default)]
    pub aadhar: String,
    #[serde(default)]
    pub class: Option<Uuid>,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub house_name: String,
    #[serde(default)]
    pub father_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub dob: Option<Date>,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub post_office: String,
    #[serde(default)]
    pub pin_code: String,
    #[serde(default)]
    pub branch: Option<Uuid>,
}

/// Query-string filter for student listings. Absent fields don't constrain.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct StudentQuery {
    pub branch: Option<Uuid>,
    pub verified: Option<bool>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

impl VerifyOutcome {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Verified => "Student Verified Successfully",
            Self::AlreadyVerified => "Student was already verified",
        }
    }
}

/// A student with its references followed, for profile pages and `GET /student/{id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedStudent {
    #[serde(flatten)]
    pub student: Student,
    pub branch_details: Option<Branch>,
    pub class_details: Option<Class>,
}

impl Document for Student {
    const COLLECTION: Collection = Collection::Students;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn validate(&self) -> RegistrarResult<()> {
        require("studentName", &self.student_name, "Please add a student name")?;
        require("registerNo", &self.register_no, "Please add a register number")?;
        self.branch.context(ValidationFailedSnafu {
            field: "branch",
            reason: "Please select a study centre",
        })?;
        Ok(())
    }
}

impl Student {
    pub fn from_form(
        NewStudent {
            student_name,
            register_no,
            admission_no,
            aadhar,
            class,
            academic_year,
            house_name,
            father_name,
            phone,
            dob,
            place,
            district,
            post_office,
            pin_code,
            branch,
        }: NewStudent,
    ) -> Self {
        Self {
            meta: Meta::new(),
            student_name: student_name.trim().to_string(),
            register_no: register_no.trim().to_string(),
            admission_no: non_empty(admission_no),
            aadhar: non_empty(aadhar),
            class,
            academic_year: non_empty(academic_year),
            house_name: non_empty(house_name),
            father_name: non_empty(father_name),
            phone: non_empty(phone),
            dob,
            place: non_empty(place),
            district: non_empty(district),
            post_office: non_empty(post_office),
            pin_code: non_empty(pin_code),
            branch,
            verified: false,
        }
    }

    ///admits a student into the caller's branch, or the one they picked if they can see all branches
    pub async fn admit(
        store: &DocumentStore,
        scope: RoleScope,
        mut form: NewStudent,
    ) -> RegistrarResult<Self> {
        form.branch = scope.effective_branch(form.branch)?;
        if let Some(branch) = form.branch {
            store.find_by_id::<Branch>(branch).await?;
        }
        if let Some(class) = form.class {
            store.find_by_id::<Class>(class).await?;
        }

        let student = store.create(Self::from_form(form)).await?;
        info!(id = %student.meta.id, register_no = %student.register_no, "Admitted student");
        Ok(student)
    }

    pub async fn list(
        store: &DocumentStore,
        scope: RoleScope,
        StudentQuery { branch, verified }: StudentQuery,
    ) -> RegistrarResult<Vec<Self>> {
        let mut filter = Filter::new();
        if let Some(branch) = scope.effective_branch(branch)? {
            filter = filter.field_eq_id("branch", branch);
        }
        if let Some(verified) = verified {
            filter = filter.field_eq("verified", verified);
        }
        store.find(filter).await
    }

    pub async fn get_for_branch(store: &DocumentStore, branch: Uuid) -> RegistrarResult<Vec<Self>> {
        store
            .find(Filter::new().field_eq_id("branch", branch))
            .await
    }

    pub async fn count_pending_admissions(
        store: &DocumentStore,
        branch: Uuid,
    ) -> RegistrarResult<u64> {
        store
            .count::<Self>(
                Filter::new()
                    .field_eq_id("branch", branch)
                    .field_eq("verified", false),
            )
            .await
    }

    pub async fn get_in_scope(
        store: &DocumentStore,
        scope: RoleScope,
        id: Uuid,
    ) -> RegistrarResult<Self> {
        let student: Self = store.find_by_id(id).await?;
        scope.ensure_covers(student.branch)?;
        Ok(student)
    }

    pub async fn populate(self, store: &DocumentStore) -> RegistrarResult<PopulatedStudent> {
        let (branch_details, class_details) = tokio::try_join!(
            Branch::lookup(store, self.branch),
            Class::lookup(store, self.class),
        )?;

        Ok(PopulatedStudent {
            student: self,
            branch_details,
            class_details,
        })
    }

    ///`verified` only ever goes from false to true, verifying twice changes nothing
    pub async fn verify(
        store: &DocumentStore,
        scope: RoleScope,
        id: Uuid,
    ) -> RegistrarResult<(Self, VerifyOutcome)> {
        let mut student = Self::get_in_scope(store, scope, id).await?;
        if student.verified {
            return Ok((student, VerifyOutcome::AlreadyVerified));
        }

        student.verified = true;
        let student = store.update(student).await?;
        info!(%id, "Verified student admission");
        Ok((student, VerifyOutcome::Verified))
    }

    pub async fn transfer(
        store: &DocumentStore,
        scope: RoleScope,
        id: Uuid,
        to: Uuid,
    ) -> RegistrarResult<Self> {
        let mut student = Self::get_in_scope(store, scope, id).await?;
        scope.ensure_covers(Some(to))?;
        store.find_by_id::<Branch>(to).await?;

        let from = student.branch.replace(to);
        let student = store.update(student).await?;
        info!(%id, ?from, %to, "Transferred student");
        Ok(student)
    }

    ///students are removed outright, there is no recovery path for them
    pub async fn remove(store: &DocumentStore, scope: RoleScope, id: Uuid) -> RegistrarResult<()> {
        Self::get_in_scope(store, scope, id).await?;
        store.delete::<Self>(id).await?;
        warn!(%id, "Deleted student");
        Ok(())
    }
}
