//! Classes, subjects and exams: the names results refer to.

use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::cce::{Class, Exam, Subject},
    error::RegistrarResult,
    state::RegistrarState,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    class_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    subject_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    exam_name: String,
}

pub async fn get_classes(
    State(state): State<RegistrarState>,
    _identity: Identity,
) -> RegistrarResult<Json<Vec<Class>>> {
    Ok(Json(Class::get_all(&state).await?))
}

pub async fn put_class(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(NewClass { class_name }): Json<NewClass>,
) -> RegistrarResult<(StatusCode, Json<Class>)> {
    identity.ensure_can(PermissionsTarget::MANAGE_EXAMS)?;
    let class = state.create(Class::new(class_name.trim())).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn get_subjects(
    State(state): State<RegistrarState>,
    _identity: Identity,
) -> RegistrarResult<Json<Vec<Subject>>> {
    Ok(Json(Subject::get_all(&state).await?))
}

pub async fn put_subject(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(NewSubject { subject_name }): Json<NewSubject>,
) -> RegistrarResult<(StatusCode, Json<Subject>)> {
    identity.ensure_can(PermissionsTarget::MANAGE_EXAMS)?;
    let subject = state.create(Subject::new(subject_name.trim())).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn get_exams(
    State(state): State<RegistrarState>,
    _identity: Identity,
) -> RegistrarResult<Json<Vec<Exam>>> {
    Ok(Json(Exam::get_all(&state).await?))
}

pub async fn put_exam(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(NewExam { exam_name }): Json<NewExam>,
) -> RegistrarResult<(StatusCode, Json<Exam>)> {
    identity.ensure_can(PermissionsTarget::MANAGE_EXAMS)?;
    let exam = state.create(Exam::new(exam_name.trim())).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}
