//! Server-rendered pages. Failures never escape as error responses here: lookups that fail are
//! logged and rendered as an empty state, actions answer with a notification fragment.

use crate::{
    auth::{AuthUtilities, Identity, PermissionsTarget, RoleScope},
    dashboard::{MenuItem, ViewSelector, ViewState},
    data::{
        branch::{Branch, BranchDetails},
        cce::{CceQuery, Class, Exam},
        course::Course,
        student::{PopulatedStudent, Student},
        user::Role,
    },
    maud_conveniences::{NotificationKind, notification, stat_card, subtitle, title},
    report::NOT_AVAILABLE,
    routes::{cce::build_report, students::TransferForm},
    state::RegistrarState,
    store::ReadPolicy,
};
use axum::{
    Form,
    extract::{Path, Query, State},
};
use maud::{Markup, html};
use std::fmt::Display;
use uuid::Uuid;

fn sign_in_prompt() -> Markup {
    html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full text-center" {
            (title("Please sign in"))
            p class="text-gray-400" {"Sign in through the staff portal to continue."}
        }
    }
}

fn or_empty<T, E: std::fmt::Debug>(result: Result<Vec<T>, E>, what: &'static str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        error!(?e, what, "Unable to fetch listing");
        vec![]
    })
}

pub async fn get_index(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
) -> Markup {
    let courses = or_empty(Course::get_all(&state, ReadPolicy::Live).await, "courses");

    state.render(identity.as_ref(), html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-4xl w-full flex flex-col space-y-4" {
            h1 class="text-3xl font-extrabold text-center" {"Study Centre Registrar"}

            @if identity.is_some() {
                div class="flex flex-row space-x-4 justify-center" {
                    a href="/dashboard" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Dashboard"}
                    a href="/results" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Results"}
                }
            }

            (subtitle("Courses"))
            @if courses.is_empty() {
                p class="text-gray-400" {"No courses on offer right now."}
            }
            div class="grid grid-cols-1 md:grid-cols-3 gap-4" {
                @for course in &courses {
                    div class="bg-gray-700 p-4 rounded flex flex-col space-y-2" {
                        h3 class="text-lg font-semibold" {(course.course_title)}
                        p class="text-gray-300" {(course.description)}
                        p class="text-sm text-gray-400" {(course.duration) " · ₹" (course.amount)}
                    }
                }
            }
        }
    })
}

fn render_menu(identity: &Identity, menu: &[MenuItem], pending_admissions: Option<u64>) -> Markup {
    html! {
        div class="grid grid-cols-2 md:grid-cols-3 gap-4" {
            @for item in menu.iter().filter(|item| identity.can(item.needs)) {
                a href=(item.link) class="bg-gray-800 hover:bg-gray-700 p-6 rounded shadow-md flex flex-row justify-between items-center" {
                    span class="font-semibold uppercase" {(item.text)}
                    @if item.badge {
                        @if let Some(pending) = pending_admissions.filter(|p| *p > 0) {
                            span class="bg-red-600 rounded-full px-2 text-sm font-bold" {(pending)}
                        }
                    }
                }
            }
        }
    }
}

fn render_branch_header(details: &BranchDetails) -> Markup {
    html! {
        div class="bg-gray-800 py-10 w-full rounded" {
            h1 class="text-center font-extrabold text-4xl uppercase" {(details.branch.study_centre_name)}
        }
        div class="grid grid-cols-3 gap-4" {
            (stat_card("Students", details.student_count))
            (stat_card("Verified", details.verified_students))
            (stat_card("Pending", details.pending_admissions))
        }
    }
}

pub async fn get_dashboard(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
) -> Markup {
    let Some(identity) = identity else {
        return state.render(None, sign_in_prompt());
    };

    let details = async {
        match (identity.role, identity.branch) {
            (Role::Admin, Some(branch)) => Branch::get_details(&state, branch).await.map(Some),
            _ => Ok(None),
        }
    };

    let mut selector = ViewSelector::new();
    let (view, details) = tokio::join!(
        selector.identity_resolved(state.store(), identity.role, identity.branch),
        details
    );
    let details = details.unwrap_or_else(|e| {
        error!(?e, "Unable to get study centre details");
        None
    });

    let body = match view {
        ViewState::SuperAdmin(view) => html! {
            (title("Administration"))
            (render_menu(&identity, view.menu, None))
        },
        ViewState::BranchAdmin(view) => html! {
            @if let Some(details) = &details {
                (render_branch_header(details))
            }
            (render_menu(&identity, view.menu, view.pending_admissions))
        },
        ViewState::AwaitingIdentity | ViewState::AwaitingBranch => html! {
            (title("No study centre yet"))
            p class="text-gray-400" {"This account hasn't been assigned to a study centre."}
        },
    };

    state.render(Some(&identity), html! {
        div class="max-w-5xl w-full flex flex-col space-y-6" {
            (body)
        }
    })
}

fn field_row(label: &str, value: Option<impl Display>) -> Markup {
    html! {
        tr {
            th class="py-2 px-4 text-left text-gray-400" {(label)}
            td class="py-2 px-4" {
                @match value {
                    Some(value) => { (value.to_string()) }
                    None => { (NOT_AVAILABLE) }
                }
            }
        }
    }
}

fn render_profile(
    identity: &Identity,
    populated: &PopulatedStudent,
    destinations: &[Branch],
) -> Markup {
    let student = &populated.student;
    let id = student.meta.id;

    html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-3xl w-full flex flex-col space-y-4" {
            (title(&student.student_name))
            @if student.verified {
                span class="bg-green-700 rounded px-2 py-1 w-fit" {"Verified"}
            } @else {
                span class="bg-yellow-700 rounded px-2 py-1 w-fit" {"Awaiting verification"}
            }

            table class="min-w-full" {
                (field_row("Register No", Some(&student.register_no)))
                (field_row("Admission No", student.admission_no.as_ref()))
                (field_row("Aadhar", student.aadhar.as_ref()))
                (field_row("Class", populated.class_details.as_ref().map(|c| &c.class_name)))
                (field_row("Academic Year", student.academic_year.as_ref()))
                (field_row("Study Centre", populated.branch_details.as_ref().map(|b| &b.study_centre_name)))
                (field_row("House Name", student.house_name.as_ref()))
                (field_row("Father's Name", student.father_name.as_ref()))
                (field_row("Phone", student.phone.as_ref()))
                (field_row("Date of Birth", student.dob.as_ref()))
                (field_row("Place", student.place.as_ref()))
                (field_row("District", student.district.as_ref()))
                (field_row("Post Office", student.post_office.as_ref()))
                (field_row("Pin Code", student.pin_code.as_ref()))
            }

            div class="flex flex-row space-x-4" {
                @if !student.verified && identity.can(PermissionsTarget::VERIFY_ADMISSIONS) {
                    button hx-post={"/internal/students/" (id) "/verify"} hx-target="#notifications" hx-swap="beforeend" class="bg-green-600 hover:bg-green-800 font-bold py-2 px-4 rounded" {
                        "Verify"
                    }
                }
                @if identity.can(PermissionsTarget::CRUD_STUDENTS) {
                    button hx-delete={"/internal/students/" (id)} hx-confirm="Do you want to delete the student" hx-target="#notifications" hx-swap="beforeend" class="bg-red-600 hover:bg-red-800 font-bold py-2 px-4 rounded" {
                        "Delete Student"
                    }
                }
            }

            @if identity.can(PermissionsTarget::TRANSFER_STUDENTS) {
                form hx-post={"/internal/students/" (id) "/transfer"} hx-target="#notifications" hx-swap="beforeend" class="flex flex-row space-x-4" {
                    (picker("to", "transfer to", student.branch, destinations.iter().map(|b| (b.meta.id, b.study_centre_name.as_str()))))
                    button type="submit" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Transfer"}
                }
            }
        }
    }
}

pub async fn get_student_profile(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Path(id): Path<Uuid>,
) -> Markup {
    let Some(identity) = identity else {
        return state.render(None, sign_in_prompt());
    };

    let populated = match Student::get_in_scope(&state, identity.scope(), id).await {
        Ok(student) => student.populate(&state).await,
        Err(e) => Err(e),
    };

    let destinations = if identity.can(PermissionsTarget::TRANSFER_STUDENTS) {
        or_empty(
            Branch::get_all(&state, Some("studyCentreName")).await,
            "study centres",
        )
    } else {
        vec![]
    };

    let body = match populated {
        Ok(populated) => render_profile(&identity, &populated, &destinations),
        Err(e) => {
            error!(?e, %id, "Unable to show student profile");
            notification(NotificationKind::Error, "Student not found")
        }
    };

    state.render(Some(&identity), body)
}

pub async fn internal_post_verify_student(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Path(id): Path<Uuid>,
) -> Markup {
    let result = match identity.ensure_can(PermissionsTarget::VERIFY_ADMISSIONS) {
        Ok(()) => {
            let scope = identity.as_ref().map_or(RoleScope::Unassigned, Identity::scope);
            Student::verify(&state, scope, id).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok((_, outcome)) => notification(NotificationKind::Success, outcome.message()),
        Err(e) => {
            error!(?e, %id, "Unable to verify student");
            notification(NotificationKind::Error, "Something went wrong")
        }
    }
}

pub async fn internal_delete_student(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Path(id): Path<Uuid>,
) -> Markup {
    let result = match identity.ensure_can(PermissionsTarget::CRUD_STUDENTS) {
        Ok(()) => {
            let scope = identity.as_ref().map_or(RoleScope::Unassigned, Identity::scope);
            Student::remove(&state, scope, id).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => notification(NotificationKind::Success, "Student Deleted Successfully"),
        Err(e) => {
            error!(?e, %id, "Unable to delete student");
            notification(NotificationKind::Error, "Something went wrong")
        }
    }
}

pub async fn internal_post_transfer_student(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Path(id): Path<Uuid>,
    Form(TransferForm { to }): Form<TransferForm>,
) -> Markup {
    let result = match identity.ensure_can(PermissionsTarget::TRANSFER_STUDENTS) {
        Ok(()) => {
            let scope = identity.as_ref().map_or(RoleScope::Unassigned, Identity::scope);
            Student::transfer(&state, scope, id, to).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => notification(NotificationKind::Success, "Student Transferred Successfully"),
        Err(e) => {
            error!(?e, %id, %to, "Unable to transfer student");
            notification(NotificationKind::Error, "Something went wrong")
        }
    }
}

fn export_query(query: &CceQuery) -> String {
    let mut parts = vec![];
    if let Some(exam) = query.exam_id {
        parts.push(format!("examId={exam}"));
    }
    if let Some(class) = query.class_id {
        parts.push(format!("classId={class}"));
    }
    if let Some(centre) = query.study_centre_id {
        parts.push(format!("studyCentreId={centre}"));
    }
    parts.join("&")
}

fn picker<'a>(
    name: &str,
    prompt: &str,
    selected: Option<Uuid>,
    options: impl Iterator<Item = (Uuid, &'a str)>,
) -> Markup {
    html! {
        select name=(name) class="shadow border rounded py-2 px-3 bg-gray-700 border-gray-600" {
            option value="" disabled selected[selected.is_none()] {(prompt)}
            @for (id, label) in options {
                option value=(id.to_string()) selected[selected == Some(id)] {(label)}
            }
        }
    }
}

pub async fn get_results(
    State(state): State<RegistrarState>,
    identity: Option<Identity>,
    Query(query): Query<CceQuery>,
) -> Markup {
    let Some(identity) = identity else {
        return state.render(None, sign_in_prompt());
    };
    if !identity.can(PermissionsTarget::VIEW_RESULTS) {
        return state.render(
            Some(&identity),
            notification(NotificationKind::Error, "You can't view results"),
        );
    }

    let picks_centre = identity.scope() == RoleScope::AllBranches;
    let (classes, exams, branches) = tokio::join!(
        Class::get_all(&state),
        Exam::get_all(&state),
        async {
            if picks_centre {
                Branch::get_all(&state, Some("studyCentreName")).await
            } else {
                Ok(vec![])
            }
        }
    );
    let classes = or_empty(classes, "classes");
    let exams = or_empty(exams, "exams");
    let branches = or_empty(branches, "study centres");

    let ready = query.exam_id.is_some()
        && query.class_id.is_some()
        && (!picks_centre || query.study_centre_id.is_some());
    let report = if ready {
        match build_report(&state, &identity, query).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(?e, ?query, "Unable to build results report");
                None
            }
        }
    } else {
        None
    };

    let can_export = identity.can(PermissionsTarget::EXPORT_RESULTS);
    let export = export_query(&query);

    state.render(Some(&identity), html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-6xl w-full flex flex-col space-y-4" {
            (title("CCE Results"))

            form method="get" action="/results" class="flex flex-row space-x-4" {
                (picker("classId", "select class", query.class_id, classes.iter().map(|c| (c.meta.id, c.class_name.as_str()))))
                @if picks_centre {
                    (picker("studyCentreId", "select study centre", query.study_centre_id, branches.iter().map(|b| (b.meta.id, b.study_centre_name.as_str()))))
                }
                (picker("examId", "select exam", query.exam_id, exams.iter().map(|e| (e.meta.id, e.exam_name.as_str()))))
                button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded" {"Show"}
            }

            @if let Some(report) = &report {
                @if can_export && !report.rows.is_empty() {
                    div class="flex flex-row space-x-4" {
                        a href={"/cce/export.xlsx?" (export)} class="bg-green-600 hover:bg-green-800 font-bold py-2 px-4 rounded" {"Download Excel"}
                        a href={"/cce/export.csv?" (export)} class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Download CSV"}
                    }
                }
                (report.render())
            } @else {
                p class="text-gray-400" {
                    @if picks_centre {
                        "Pick a class, a study centre and an exam."
                    } @else {
                        "Pick a class and an exam."
                    }
                }
            }
        }
    })
}
