use crate::{graph::graphql_handler, state::RegistrarState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod catalogue;
pub mod cce;
pub mod courses;
pub mod onboarding;
pub mod students;
pub mod study_centre;
pub mod views;

///CSV imports are the largest bodies we accept
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn router(state: RegistrarState) -> Router {
    Router::new()
        .route("/", get(views::get_index))
        .route("/dashboard", get(views::get_dashboard))
        .route("/students/{id}", get(views::get_student_profile))
        .route("/results", get(views::get_results))
        .route(
            "/internal/students/{id}/verify",
            post(views::internal_post_verify_student),
        )
        .route(
            "/internal/students/{id}",
            delete(views::internal_delete_student),
        )
        .route(
            "/internal/students/{id}/transfer",
            post(views::internal_post_transfer_student),
        )
        .route("/onboarding", post(onboarding::post_first_super_admin))
        .route(
            "/study-centre",
            get(study_centre::get_study_centres).post(study_centre::post_study_centre),
        )
        .route("/study-centre/{id}", get(study_centre::get_study_centre))
        .route(
            "/study-centre/details/{id}",
            get(study_centre::get_study_centre_details),
        )
        .route(
            "/student",
            post(students::post_list_students).put(students::put_new_student),
        )
        .route("/student/import", post(students::post_import_students))
        .route(
            "/student/admission/verify/{id}",
            post(students::post_verify_student),
        )
        .route(
            "/student/{id}",
            get(students::get_student).delete(students::delete_student),
        )
        .route(
            "/student/{id}/transfer",
            post(students::post_transfer_student),
        )
        .route("/cce", get(cce::get_cce).put(cce::put_cce))
        .route("/cce/export.xlsx", get(cce::get_cce_export_xlsx))
        .route("/cce/export.csv", get(cce::get_cce_export_csv))
        .route(
            "/course",
            get(courses::get_courses).put(courses::put_course),
        )
        .route("/course/{id}", delete(courses::delete_course))
        .route("/course/{id}/restore", post(courses::post_restore_course))
        .route(
            "/class",
            get(catalogue::get_classes).put(catalogue::put_class),
        )
        .route(
            "/subject",
            get(catalogue::get_subjects).put(catalogue::put_subject),
        )
        .route("/exam", get(catalogue::get_exams).put(catalogue::put_exam))
        .route("/graphql", post(graphql_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{RoleScope, USER_HEADER},
        data::{
            Meta,
            student::{Student, tests::{new_student, seed_branch}},
            user::{Role, User},
        },
        store::DocumentStore,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn seed_user(store: &DocumentStore, role: Role, branch: Option<Uuid>) -> Uuid {
        let user = store
            .create(User {
                meta: Meta::new(),
                username: format!("{role}-user"),
                email: "staff@example.org".to_string(),
                phone: None,
                role,
                branch,
                password_hash: None,
            })
            .await
            .unwrap();
        user.meta.id
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(USER_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn deleting_a_student_removes_it_from_listings_and_the_graph() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);

        let tirur = seed_branch(&store, "Tirur").await;
        let root = seed_user(&store, Role::SuperAdmin, None).await;
        let s1 = Student::admit(&store, RoleScope::AllBranches, new_student("Aysha", "R1", tirur.meta.id))
            .await
            .unwrap();
        Student::admit(&store, RoleScope::AllBranches, new_student("Hiba", "R2", tirur.meta.id))
            .await
            .unwrap();

        let uri = format!("/student/{}", s1.meta.id);
        let (status, _) = send(&app, "DELETE", &uri, Some(root), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, Some(root), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let listing = format!("/student?branch={}", tirur.meta.id);
        let (status, listed) = send(&app, "POST", &listing, Some(root), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["registerNo"], "R2");

        let query = json!({
            "query": format!("{{ branchStudents(branchId: \"{}\") {{ registerNo }} }}", tirur.meta.id)
        });
        let (status, graph) = send(&app, "POST", "/graphql", Some(root), Some(query)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(graph["data"]["branchStudents"], json!([{ "registerNo": "R2" }]));
    }

    #[tokio::test]
    async fn verifying_twice_never_unverifies() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);

        let tirur = seed_branch(&store, "Tirur").await;
        let admin = seed_user(&store, Role::Admin, Some(tirur.meta.id)).await;
        let s1 = Student::admit(&store, RoleScope::AllBranches, new_student("Aysha", "R1", tirur.meta.id))
            .await
            .unwrap();

        let uri = format!("/student/admission/verify/{}", s1.meta.id);
        let (status, first) = send(&app, "POST", &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["student"]["verified"], true);
        assert_eq!(first["message"], "Student Verified Successfully");

        let (status, second) = send(&app, "POST", &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["student"]["verified"], true);

        let details = format!("/study-centre/details/{}", tirur.meta.id);
        let (_, details) = send(&app, "GET", &details, Some(admin), None).await;
        assert_eq!(details["pendingAdmissions"], 0);
        assert_eq!(details["verifiedStudents"], 1);
    }

    #[tokio::test]
    async fn requests_need_an_identity_and_the_right_permissions() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);

        let tirur = seed_branch(&store, "Tirur").await;
        let areekode = seed_branch(&store, "Areekode").await;
        let admin = seed_user(&store, Role::Admin, Some(tirur.meta.id)).await;

        let (status, _) = send(&app, "POST", "/student", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, "POST", "/student", Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let centre = json!({ "studyCentreName": "Kondotty" });
        let (status, _) = send(&app, "POST", "/study-centre", Some(admin), Some(centre)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let elsewhere = format!("/student?branch={}", areekode.meta.id);
        let (status, _) = send(&app, "POST", &elsewhere, Some(admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "GET", "/course?includeDeleted=true", Some(admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn only_super_admins_transfer_students() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);

        let tirur = seed_branch(&store, "Tirur").await;
        let areekode = seed_branch(&store, "Areekode").await;
        let admin = seed_user(&store, Role::Admin, Some(tirur.meta.id)).await;
        let root = seed_user(&store, Role::SuperAdmin, None).await;
        let s1 = Student::admit(&store, RoleScope::AllBranches, new_student("Aysha", "R1", tirur.meta.id))
            .await
            .unwrap();

        let uri = format!("/student/{}/transfer", s1.meta.id);
        let to = json!({ "to": areekode.meta.id });
        let (status, _) = send(&app, "POST", &uri, Some(admin), Some(to.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let student: Student = store.find_by_id(s1.meta.id).await.unwrap();
        assert_eq!(student.branch, Some(tirur.meta.id));

        let (status, moved) = send(&app, "POST", &uri, Some(root), Some(to)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["branch"], areekode.meta.id.to_string());
    }

    #[tokio::test]
    async fn courses_are_soft_deleted_and_restorable_over_http() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);
        let root = seed_user(&store, Role::SuperAdmin, None).await;

        let course = json!({
            "courseTitle": "Arabic Diploma",
            "duration": "1 year",
            "amount": "4000",
            "image": "arabic.png",
            "details": "Weekend classes",
            "description": "An introduction to Arabic"
        });
        let (status, created) = send(&app, "PUT", "/course", Some(root), Some(course)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "DELETE", &format!("/course/{id}"), Some(root), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, public) = send(&app, "GET", "/course", None, None).await;
        assert_eq!(public, json!([]));
        let (_, everything) = send(&app, "GET", "/course?includeDeleted=true", Some(root), None).await;
        assert_eq!(everything[0]["deleted"], true);

        let (status, restored) =
            send(&app, "POST", &format!("/course/{id}/restore"), Some(root), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restored["deleted"], false);
        let (_, public) = send(&app, "GET", "/course", None, None).await;
        assert_eq!(public.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn invalid_courses_report_the_field() {
        let state = RegistrarState::in_memory();
        let store = state.store().clone();
        let app = router(state);
        let root = seed_user(&store, Role::SuperAdmin, None).await;

        let course = json!({
            "courseTitle": "Arabic Diploma",
            "duration": "1 year",
            "amount": "4000",
            "image": "",
            "details": "Weekend classes",
            "description": "An introduction to Arabic"
        });
        let (status, body) = send(&app, "PUT", "/course", Some(root), Some(course)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid `image`: Please upload an image");
    }

    #[tokio::test]
    async fn onboarding_only_works_while_there_are_no_users() {
        let state = RegistrarState::in_memory();
        let app = router(state);

        let form = json!({ "username": "root", "email": "root@example.org" });
        let (status, body) = send(&app, "POST", "/onboarding", None, Some(form.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "superAdmin");
        assert!(body["user"].get("passwordHash").is_none());
        assert_eq!(body["generatedPassword"].as_str().map(str::len), Some(12));

        let (status, _) = send(&app, "POST", "/onboarding", None, Some(form)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
