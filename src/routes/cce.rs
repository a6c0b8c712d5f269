use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget},
    data::cce::{CceQuery, CceResult, NewCceResult},
    error::RegistrarResult,
    report::{Report, ReportRecord},
    state::RegistrarState,
};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, header},
    response::IntoResponse,
};

pub async fn get_cce(
    State(state): State<RegistrarState>,
    identity: Identity,
    Query(query): Query<CceQuery>,
) -> RegistrarResult<Json<Vec<ReportRecord>>> {
    identity.ensure_can(PermissionsTarget::VIEW_RESULTS)?;
    Ok(Json(
        CceResult::get_report_records(&state, identity.scope(), query).await?,
    ))
}

pub async fn put_cce(
    State(state): State<RegistrarState>,
    identity: Identity,
    Json(form): Json<NewCceResult>,
) -> RegistrarResult<Json<CceResult>> {
    identity.ensure_can(PermissionsTarget::ENTER_MARKS)?;
    Ok(Json(
        CceResult::record(&state, identity.scope(), form).await?,
    ))
}

///the report as the results page shows it, for the caller's effective study centre
pub async fn build_report(
    state: &RegistrarState,
    identity: &Identity,
    query: CceQuery,
) -> RegistrarResult<Report> {
    let scope = identity.scope();
    let branch = scope.effective_branch(query.study_centre_id)?;
    let records = CceResult::get_report_records(state, scope, query).await?;
    Ok(Report::build(records, branch))
}

fn attachment(file_name: &str, fallback: &'static str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static(fallback))
}

pub async fn get_cce_export_xlsx(
    State(state): State<RegistrarState>,
    identity: Identity,
    Query(query): Query<CceQuery>,
) -> RegistrarResult<impl IntoResponse> {
    identity.ensure_can(PermissionsTarget::EXPORT_RESULTS)?;

    let report = build_report(&state, &identity, query).await?;
    let bytes = report.to_xlsx()?;
    info!(rows = report.rows.len(), columns = report.columns.len(), "Exported results workbook");

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
            ),
            (
                header::CONTENT_DISPOSITION,
                attachment(
                    &report.file_name(),
                    "attachment; filename=\"results.xlsx\"",
                ),
            ),
        ],
        bytes,
    ))
}

pub async fn get_cce_export_csv(
    State(state): State<RegistrarState>,
    identity: Identity,
    Query(query): Query<CceQuery>,
) -> RegistrarResult<impl IntoResponse> {
    identity.ensure_can(PermissionsTarget::EXPORT_RESULTS)?;

    let report = build_report(&state, &identity, query).await?;
    let bytes = report.to_csv()?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (
                header::CONTENT_DISPOSITION,
                attachment(
                    &format!("{}.csv", report.file_stem()),
                    "attachment; filename=\"results.csv\"",
                ),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::{RoleScope, USER_HEADER},
        data::{
            Meta,
            cce::{CceResult, Class, Exam, NewCceResult, Subject, SubjectResult},
            student::{Student, tests::{new_student, seed_branch}},
            user::{Role, User},
        },
        report::SHEET_NAME,
        routes::router,
        state::RegistrarState,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
    use http_body_util::BodyExt;
    use std::io::Cursor;
    use tower::ServiceExt;

    #[tokio::test]
    async fn admins_export_only_their_own_centre() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);

        let tirur = seed_branch(&store, "Tirur").await;
        let areekode = seed_branch(&store, "Areekode").await;
        let class = store.create(Class::new("Class 5")).await.unwrap();
        let exam = store.create(Exam::new("First Term")).await.unwrap();
        let arabic = store.create(Subject::new("Arabic")).await.unwrap();
        let urdu = store.create(Subject::new("Urdu")).await.unwrap();

        for (reg, branch, subject) in [("R1", tirur.meta.id, arabic.meta.id), ("R2", areekode.meta.id, urdu.meta.id)] {
            let mut form = new_student("Student", reg, branch);
            form.class = Some(class.meta.id);
            let student = Student::admit(&store, RoleScope::AllBranches, form).await.unwrap();
            CceResult::record(
                &store,
                RoleScope::AllBranches,
                NewCceResult {
                    student: student.meta.id,
                    exam: exam.meta.id,
                    class: None,
                    subject_results: vec![SubjectResult { subject, cce_mark: 17.0 }],
                },
            )
            .await
            .unwrap();
        }

        let admin = store
            .create(User {
                meta: Meta::new(),
                username: "tirur".to_string(),
                email: "tirur@example.org".to_string(),
                phone: None,
                role: Role::Admin,
                branch: Some(tirur.meta.id),
                password_hash: None,
            })
            .await
            .unwrap();

        let uri = format!("/cce/export.xlsx?examId={}&classId={}", exam.meta.id, class.meta.id);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(USER_HEADER, admin.meta.id.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Tirur(Class 5).xlsx\""
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let rows: Vec<Vec<Data>> = range.rows().map(<[Data]>::to_vec).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], Data::String("Arabic".to_string()));
        assert_eq!(rows[1][0], Data::String("R1".to_string()));
        assert_eq!(rows[1][2], Data::Float(17.0));
    }
}
