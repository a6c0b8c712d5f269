use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::course::{Course, NewCourse},
    error::RegistrarResult,
    state::RegistrarState,
    store::ReadPolicy,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListQuery {
    #[serde(default)]
    include_deleted: bool,
}

///public, courses are advertised on the landing page
pub async fn get_courses(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Query(CourseListQuery { include_deleted }): Query<CourseListQuery>,
) -> RegistrarResult<Json<Vec<Course>>> {
    let policy = if include_deleted {
        identity.ensure_can(PermissionsTarget::RECOVER_DELETED)?;
        ReadPolicy::IncludeDeleted
    } else {
        ReadPolicy::Live
    };

    Ok(Json(Course::get_all(&state, policy).await?))
}

pub async fn put_course(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(form): Json<NewCourse>,
) -> RegistrarResult<(StatusCode, Json<Course>)> {
    identity.ensure_can(PermissionsTarget::CRUD_COURSES)?;

    let course = state.create(Course::from_form(form)).await?;
    info!(id = %course.meta.id, title = ?course.course_title, "Created course");

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn delete_course(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<StatusCode> {
    identity.ensure_can(PermissionsTarget::CRUD_COURSES)?;
    Course::remove(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_restore_course(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<Json<Course>> {
    identity.ensure_can(PermissionsTarget::RECOVER_DELETED)?;
    Ok(Json(Course::restore(&state, id).await?))
}
