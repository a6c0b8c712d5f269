use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::{
        import::{ImportSummary, import_students},
        student::{NewStudent, PopulatedStudent, Student, StudentQuery},
    },
    error::{MultipartSnafu, RegistrarResult},
    state::RegistrarState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use uuid::Uuid;

pub async fn post_list_students(
    State(state): State<RegistrarState>,
    identity: Identity,
    Query(query): Query<StudentQuery>,
) -> RegistrarResult<Json<Vec<Student>>> {
    identity.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;
    Ok(Json(Student::list(&state, identity.scope(), query).await?))
}

pub async fn put_new_student(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(form): Json<NewStudent>,
) -> RegistrarResult<(StatusCode, Json<Student>)> {
    identity.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;
    let student = Student::admit(&state, identity.scope(), form).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_student(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<Json<PopulatedStudent>> {
    identity.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;
    let student = Student::get_in_scope(&state, identity.scope(), id).await?;
    Ok(Json(student.populate(&state).await?))
}

#[derive(Serialize)]
pub struct VerifyResponse {
    message: &'static str,
    student: Student,
}

pub async fn post_verify_student(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<Json<VerifyResponse>> {
    identity.ensure_can(PermissionsTarget::VERIFY_ADMISSIONS)?;
    let (student, outcome) = Student::verify(&state, identity.scope(), id).await?;

    Ok(Json(VerifyResponse {
        message: outcome.message(),
        student,
    }))
}

#[derive(Deserialize)]
pub struct TransferForm {
    pub to: Uuid,
}

pub async fn post_transfer_student(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(TransferForm { to }): Json<TransferForm>,
) -> RegistrarResult<Json<Student>> {
    identity.ensure_can(PermissionsTarget::TRANSFER_STUDENTS)?;
    Ok(Json(
        Student::transfer(&state, identity.scope(), id, to).await?,
    ))
}

pub async fn delete_student(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<StatusCode> {
    identity.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;
    Student::remove(&state, identity.scope(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ImportQuery {
    branch: Option<Uuid>,
}

pub async fn post_import_students(
    State(state): State<RegistrarState>,
    identity: Identity,
    Query(ImportQuery { branch }): Query<ImportQuery>,
    mut multipart: Multipart,
) -> RegistrarResult<(StatusCode, Json<ImportSummary>)> {
    identity.ensure_can(PermissionsTarget::IMPORT_CSVS)?;

    let mut csvs = vec![];
    loop {
        let Some(field) = multipart.next_field().await.context(MultipartSnafu)? else {
            break;
        };
        csvs.push(field.bytes().await.context(MultipartSnafu)?);
    }

    let summary = import_students(&state, identity.scope(), branch, &csvs).await?;
    let status = if summary.errors.is_empty() {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(summary)))
}
