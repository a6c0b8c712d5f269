use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::branch::{Branch, BranchDetails, NewBranch},
    error::RegistrarResult,
    state::RegistrarState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SortQuery {
    sort: Option<String>,
}

#[derive(Serialize)]
pub struct Docs<T> {
    docs: Vec<T>,
}

pub async fn get_study_centres(
    State(state): State<RegistrarState>,
    _identity: Identity,
    Query(SortQuery { sort }): Query<SortQuery>,
) -> RegistrarResult<Json<Docs<Branch>>> {
    let docs = Branch::get_all(&state, sort.as_deref()).await?;
    Ok(Json(Docs { docs }))
}

pub async fn post_study_centre(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(form): Json<NewBranch>,
) -> RegistrarResult<(StatusCode, Json<Branch>)> {
    identity.ensure_can(PermissionsTarget::CRUD_BRANCHES)?;

    let branch = state.create(Branch::from_form(form)).await?;
    info!(id = %branch.meta.id, name = ?branch.study_centre_name, "Created study centre");

    Ok((StatusCode::CREATED, Json(branch)))
}

pub async fn get_study_centre(
    State(state): State<RegistrarState>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<Json<Branch>> {
    Ok(Json(state.find_by_id(id).await?))
}

pub async fn get_study_centre_details(
    State(state): State<RegistrarState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> RegistrarResult<Json<BranchDetails>> {
    identity.scope().ensure_covers(Some(id))?;
    Ok(Json(Branch::get_details(&state, id).await?))
}
