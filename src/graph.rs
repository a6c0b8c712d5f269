//! The GraphQL surface. Resolvers only translate arguments and call into `data::*`, the same
//! functions the resource routes use.

use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::{
        branch::Branch,
        cce::Class,
        student::{Student, StudentQuery},
        user::{NewUser, Role, User},
    },
    error::RegistrarError,
    state::RegistrarState,
    store::DocumentStore,
};
use async_graphql::{
    Context, EmptySubscription, ID, InputObject, Object, Result, Schema, SimpleObject,
};
use axum::{Json, extract::State};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

pub type RegistrarSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(store: DocumentStore) -> RegistrarSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

pub async fn graphql_handler(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(state.schema().execute(request.data(identity)).await)
}

fn store<'a>(ctx: &Context<'a>) -> Result<&'a DocumentStore> {
    ctx.data::<DocumentStore>()
}

fn identity<'a>(ctx: &Context<'a>) -> Result<&'a Identity> {
    Ok(ctx
        .data_opt::<Identity>()
        .ok_or(RegistrarError::Unauthenticated)?)
}

fn parse_id(id: &ID) -> Result<Uuid> {
    Ok(Uuid::parse_str(id.as_str())?)
}

pub struct StudentObject(Student);

#[Object(name = "Student")]
impl StudentObject {
    async fn id(&self) -> ID {
        ID(self.0.meta.id.to_string())
    }

    async fn student_name(&self) -> &str {
        &self.0.student_name
    }

    async fn register_no(&self) -> &str {
        &self.0.register_no
    }

    async fn aadhar(&self) -> Option<&str> {
        self.0.aadhar.as_deref()
    }

    async fn admission_no(&self) -> Option<&str> {
        self.0.admission_no.as_deref()
    }

    async fn academic_year(&self) -> Option<&str> {
        self.0.academic_year.as_deref()
    }

    async fn verified(&self) -> bool {
        self.0.verified
    }

    ///the class name, resolved on demand
    async fn class(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        Ok(Class::lookup(store(ctx)?, self.0.class)
            .await?
            .map(|class| class.class_name))
    }

    async fn branch(&self, ctx: &Context<'_>) -> Result<Option<BranchObject>> {
        Ok(Branch::lookup(store(ctx)?, self.0.branch)
            .await?
            .map(BranchObject))
    }
}

pub struct BranchObject(Branch);

#[Object(name = "Branch")]
impl BranchObject {
    async fn id(&self) -> ID {
        ID(self.0.meta.id.to_string())
    }

    async fn study_centre_name(&self) -> &str {
        &self.0.study_centre_name
    }

    ///older clients ask for `branchName`
    async fn branch_name(&self) -> &str {
        &self.0.study_centre_name
    }

    async fn place(&self) -> Option<&str> {
        self.0.place.as_deref()
    }

    async fn district(&self) -> Option<&str> {
        self.0.district.as_deref()
    }

    async fn image(&self) -> Option<&str> {
        self.0.image.as_deref()
    }

    async fn phone(&self) -> Option<&str> {
        self.0.phone.as_deref()
    }

    async fn email(&self) -> Option<&str> {
        self.0.email.as_deref()
    }
}

pub struct UserObject(User);

#[Object(name = "User")]
impl UserObject {
    async fn id(&self) -> ID {
        ID(self.0.meta.id.to_string())
    }

    async fn username(&self) -> &str {
        &self.0.username
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    async fn phone(&self) -> Option<&str> {
        self.0.phone.as_deref()
    }

    async fn role(&self) -> &'static str {
        self.0.role.as_str()
    }

    async fn branch(&self, ctx: &Context<'_>) -> Result<Option<BranchObject>> {
        Ok(Branch::lookup(store(ctx)?, self.0.branch)
            .await?
            .map(BranchObject))
    }
}

#[derive(InputObject)]
pub struct CreateUserInput {
    username: String,
    email: String,
    phone: Option<String>,
    ///`superAdmin` or `admin`
    role: String,
    branch: Option<ID>,
    ///generated and returned once when left out
    password: Option<String>,
}

#[derive(SimpleObject)]
pub struct CreatedUser {
    user: UserObject,
    generated_password: Option<String>,
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn students(
        &self,
        ctx: &Context<'_>,
        verified: Option<bool>,
    ) -> Result<Vec<StudentObject>> {
        let identity = identity(ctx)?;
        identity.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;

        let query = StudentQuery {
            branch: None,
            verified,
        };
        Ok(Student::list(store(ctx)?, identity.scope(), query)
            .await?
            .into_iter()
            .map(StudentObject)
            .collect())
    }

    async fn branches(&self, ctx: &Context<'_>) -> Result<Vec<BranchObject>> {
        identity(ctx)?;
        Ok(Branch::get_all(store(ctx)?, None)
            .await?
            .into_iter()
            .map(BranchObject)
            .collect())
    }

    async fn branch(&self, ctx: &Context<'_>, id: ID) -> Result<Option<BranchObject>> {
        identity(ctx)?;
        Ok(Branch::lookup(store(ctx)?, Some(parse_id(&id)?))
            .await?
            .map(BranchObject))
    }

    ///staff accounts, super admins are never listed
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<UserObject>> {
        let scope = identity(ctx)?.scope();
        Ok(User::get_all_staff(store(ctx)?)
            .await?
            .into_iter()
            .filter(|user| scope.covers(user.branch))
            .map(UserObject)
            .collect())
    }

    async fn branch_students(
        &self,
        ctx: &Context<'_>,
        branch_id: ID,
    ) -> Result<Vec<StudentObject>> {
        let identity = identity(ctx)?;
        identity.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;

        let branch = parse_id(&branch_id)?;
        identity.scope().ensure_covers(Some(branch))?;

        Ok(Student::get_for_branch(store(ctx)?, branch)
            .await?
            .into_iter()
            .map(StudentObject)
            .collect())
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<CreatedUser> {
        identity(ctx)?.ensure_can(PermissionsTarget::CRUD_USERS)?;

        let CreateUserInput {
            username,
            email,
            phone,
            role,
            branch,
            password,
        } = input;
        let form = NewUser {
            username,
            email,
            phone: phone.unwrap_or_default(),
            role: role.parse::<Role>()?,
            branch: branch.as_ref().map(parse_id).transpose()?,
            password: password.map(SecretString::from),
        };

        let (user, generated) = User::insert_into_database(store(ctx)?, form).await?;
        Ok(CreatedUser {
            user: UserObject(user),
            generated_password: generated.map(|p| p.expose_secret().to_string()),
        })
    }

    async fn get_all_users(&self, ctx: &Context<'_>) -> Result<Vec<UserObject>> {
        identity(ctx)?.ensure_can(PermissionsTarget::CRUD_USERS)?;
        Ok(User::get_all(store(ctx)?)
            .await?
            .into_iter()
            .map(UserObject)
            .collect())
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> Result<UserObject> {
        identity(ctx)?.ensure_can(PermissionsTarget::CRUD_USERS)?;
        Ok(UserObject(
            User::remove_from_database(store(ctx)?, parse_id(&id)?).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::RoleScope,
        data::student::tests::{new_student, seed_branch},
    };
    use async_graphql::Request;
    use serde_json::{Value, json};

    fn root() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "root".to_string(),
            role: Role::SuperAdmin,
            branch: None,
        }
    }

    async fn run(schema: &RegistrarSchema, identity: Identity, query: &str) -> (Value, usize) {
        let response = schema.execute(Request::new(query).data(identity)).await;
        let errors = response.errors.len();
        (response.data.into_json().unwrap(), errors)
    }

    #[tokio::test]
    async fn users_skip_super_admins_and_resolve_their_branch() {
        let store = DocumentStore::in_memory();
        let schema = build_schema(store.clone());
        let branch = seed_branch(&store, "Tirur").await;

        let create = format!(
            r#"mutation {{
                createUser(input: {{ username: "tirur", email: "tirur@example.org", role: "admin", branch: "{}" }}) {{
                    generatedPassword
                    user {{ role branch {{ studyCentreName }} }}
                }}
            }}"#,
            branch.meta.id
        );
        let (created, errors) = run(&schema, root(), &create).await;
        assert_eq!(errors, 0);
        assert_eq!(
            created["createUser"]["generatedPassword"]
                .as_str()
                .map(str::len),
            Some(12)
        );
        assert_eq!(
            created["createUser"]["user"]["branch"]["studyCentreName"],
            "Tirur"
        );

        let (_, errors) = run(
            &schema,
            root(),
            r#"mutation { createUser(input: { username: "boss", email: "boss@example.org", role: "superAdmin" }) { user { id } } }"#,
        )
        .await;
        assert_eq!(errors, 0);

        let (users, errors) = run(&schema, root(), "{ users { username role } }").await;
        assert_eq!(errors, 0);
        assert_eq!(users["users"], json!([{ "username": "tirur", "role": "admin" }]));

        let (all, _) = run(&schema, root(), "mutation { getAllUsers { username } }").await;
        assert_eq!(all["getAllUsers"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn create_user_rejects_a_bad_email_and_an_admin_without_a_branch() {
        let store = DocumentStore::in_memory();
        let schema = build_schema(store.clone());

        for input in [
            r#"{ username: "a", email: "nope", role: "superAdmin" }"#,
            r#"{ username: "a", email: "a@example.org", role: "admin" }"#,
        ] {
            let query = format!("mutation {{ createUser(input: {input}) {{ user {{ id }} }} }}");
            let (_, errors) = run(&schema, root(), &query).await;
            assert_eq!(errors, 1);
        }
        assert!(User::get_all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn branch_students_drop_deleted_students_and_respect_scope() {
        let store = DocumentStore::in_memory();
        let schema = build_schema(store.clone());
        let tirur = seed_branch(&store, "Tirur").await;
        let areekode = seed_branch(&store, "Areekode").await;

        let s1 = Student::admit(&store, RoleScope::AllBranches, new_student("Aysha", "R1", tirur.meta.id))
            .await
            .unwrap();
        Student::admit(&store, RoleScope::AllBranches, new_student("Hiba", "R2", tirur.meta.id))
            .await
            .unwrap();
        Student::remove(&store, RoleScope::AllBranches, s1.meta.id)
            .await
            .unwrap();

        let query = format!(
            "{{ branchStudents(branchId: \"{}\") {{ registerNo branch {{ studyCentreName }} }} }}",
            tirur.meta.id
        );
        let (found, errors) = run(&schema, root(), &query).await;
        assert_eq!(errors, 0);
        assert_eq!(
            found["branchStudents"],
            json!([{ "registerNo": "R2", "branch": { "studyCentreName": "Tirur" } }])
        );

        let outsider = Identity {
            user_id: Uuid::new_v4(),
            username: "areekode".to_string(),
            role: Role::Admin,
            branch: Some(areekode.meta.id),
        };
        let (_, errors) = run(&schema, outsider.clone(), &query).await;
        assert_eq!(errors, 1);

        let (students, errors) = run(&schema, outsider, "{ students { registerNo } }").await;
        assert_eq!(errors, 0);
        assert_eq!(students["students"], json!([]));
    }
}
