use crate::{
    auth::{PermissionsTarget, RoleScope},
    data::{student::Student, user::Role},
    error::RegistrarResult,
    store::DocumentStore,
};
use std::future::Future;
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub text: &'static str,
    pub link: &'static str,
    pub needs: PermissionsTarget,
    ///shows the pending admission count next to the item
    pub badge: bool,
}

impl MenuItem {
    const fn new(text: &'static str, link: &'static str, needs: PermissionsTarget) -> Self {
        Self {
            text,
            link,
            needs,
            badge: false,
        }
    }

    const fn with_badge(self) -> Self {
        Self {
            badge: true,
            ..self
        }
    }
}

pub const SUPER_ADMIN_MENU: [MenuItem; 15] = [
    MenuItem::new("STUDY CENTERS", "/study-centre", PermissionsTarget::CRUD_BRANCHES),
    MenuItem::new("STUDENTS", "/student", PermissionsTarget::VIEW_STUDENTS),
    MenuItem::new("SUBJECTS", "/subject", PermissionsTarget::MANAGE_EXAMS),
    MenuItem::new("ALL TEACHERS", "/graphql", PermissionsTarget::CRUD_USERS),
    MenuItem::new("ADMISSION REQUESTS", "/student?verified=false", PermissionsTarget::VERIFY_ADMISSIONS),
    MenuItem::new("CPET COURSES", "/course", PermissionsTarget::CRUD_COURSES),
    MenuItem::new("CLASS MANAGEMENT", "/class", PermissionsTarget::MANAGE_EXAMS),
    MenuItem::new("EXAMS", "/exam", PermissionsTarget::MANAGE_EXAMS),
    MenuItem::new("FA MARKS", "/cce", PermissionsTarget::VIEW_RESULTS),
    MenuItem::new("RESULTS", "/results", PermissionsTarget::VIEW_RESULTS),
    MenuItem::new("TIMETABLES", "/exam", PermissionsTarget::VIEW_RESULTS),
    MenuItem::new("DOWNLOADS", "/cce/export.xlsx", PermissionsTarget::EXPORT_RESULTS),
    MenuItem::new("Configurations", "/course?includeDeleted=true", PermissionsTarget::RECOVER_DELETED),
    MenuItem::new("Admission Management", "/student/import", PermissionsTarget::IMPORT_CSVS),
    MenuItem::new("Previous Results", "/results", PermissionsTarget::VIEW_RESULTS),
];

pub const BRANCH_ADMIN_MENU: [MenuItem; 9] = [
    MenuItem::new("STUDENTS", "/student", PermissionsTarget::VIEW_STUDENTS),
    MenuItem::new("TEACHERS", "/graphql", PermissionsTarget::VIEW_STUDENTS),
    MenuItem::new("Uploads", "/student/import", PermissionsTarget::IMPORT_CSVS),
    MenuItem::new("New Admissions", "/student?verified=false", PermissionsTarget::VERIFY_ADMISSIONS)
        .with_badge(),
    MenuItem::new("Mark Entry", "/cce", PermissionsTarget::ENTER_MARKS),
    MenuItem::new("Hall Tickets", "/exam", PermissionsTarget::VIEW_RESULTS),
    MenuItem::new("Exam Results", "/results", PermissionsTarget::VIEW_RESULTS),
    MenuItem::new("Profile", "/study-centre", PermissionsTarget::VIEW_STUDENTS),
    MenuItem::new("Previous Results", "/results", PermissionsTarget::VIEW_RESULTS),
];

/// Where the pending admission count comes from. The store in production, a counting fake in
/// tests.
pub trait AdmissionCounter {
    fn count_pending_admissions(
        &self,
        branch: Uuid,
    ) -> impl Future<Output = RegistrarResult<u64>> + Send;
}

impl AdmissionCounter for DocumentStore {
    async fn count_pending_admissions(&self, branch: Uuid) -> RegistrarResult<u64> {
        Student::count_pending_admissions(self, branch).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperAdminView {
    pub menu: &'static [MenuItem],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchAdminView {
    pub branch: Uuid,
    pub menu: &'static [MenuItem],
    ///`None` when counting failed, the badge is then left off
    pub pending_admissions: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    AwaitingIdentity,
    ///an admin whose branch id hasn't resolved yet
    AwaitingBranch,
    SuperAdmin(SuperAdminView),
    BranchAdmin(BranchAdminView),
}

impl ViewState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::SuperAdmin(_) | Self::BranchAdmin(_))
    }

    pub fn menu(&self) -> &'static [MenuItem] {
        match self {
            Self::SuperAdmin(view) => view.menu,
            Self::BranchAdmin(view) => view.menu,
            Self::AwaitingIdentity | Self::AwaitingBranch => &[],
        }
    }

    pub const fn scope(&self) -> Option<RoleScope> {
        match self {
            Self::SuperAdmin(_) => Some(RoleScope::AllBranches),
            Self::BranchAdmin(view) => Some(RoleScope::OwnBranch(view.branch)),
            Self::AwaitingIdentity | Self::AwaitingBranch => None,
        }
    }
}

/// Picks the dashboard for an identity as it resolves.
///
/// Once a terminal view is reached, later identity updates are ignored. The pending admission
/// count is fetched exactly once, on entering [`ViewState::BranchAdmin`], so never before the
/// admin's branch id is known.
#[derive(Debug, Default)]
pub struct ViewSelector {
    state: ViewState,
}

impl ViewSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    pub async fn identity_resolved(
        &mut self,
        counter: &impl AdmissionCounter,
        role: Role,
        branch: Option<Uuid>,
    ) -> &ViewState {
        if self.state.is_terminal() {
            return &self.state;
        }

        self.state = match (role, branch) {
            (Role::SuperAdmin, _) => ViewState::SuperAdmin(SuperAdminView {
                menu: &SUPER_ADMIN_MENU,
            }),
            (Role::Admin, None) => ViewState::AwaitingBranch,
            (Role::Admin, Some(branch)) => {
                let pending_admissions = match counter.count_pending_admissions(branch).await {
                    Ok(count) => Some(count),
                    Err(e) => {
                        error!(?e, %branch, "Unable to count pending admissions");
                        None
                    }
                };

                ViewState::BranchAdmin(BranchAdminView {
                    branch,
                    menu: &BRANCH_ADMIN_MENU,
                    pending_admissions,
                })
            }
        };

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::student::tests::{new_student, seed_branch};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCounter {
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<Uuid>>,
    }

    impl AdmissionCounter for CountingCounter {
        async fn count_pending_admissions(&self, branch: Uuid) -> RegistrarResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(branch);
            Ok(3)
        }
    }

    #[tokio::test]
    async fn pending_count_waits_for_the_branch_and_runs_once() {
        let counter = CountingCounter::default();
        let branch = Uuid::new_v4();
        let mut selector = ViewSelector::new();

        let state = selector.identity_resolved(&counter, Role::Admin, None).await;
        assert_eq!(*state, ViewState::AwaitingBranch);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        let state = selector
            .identity_resolved(&counter, Role::Admin, Some(branch))
            .await
            .clone();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*counter.seen.lock().unwrap(), [branch]);
        let ViewState::BranchAdmin(view) = state else {
            panic!("expected the branch admin view, got {state:?}");
        };
        assert_eq!(view.pending_admissions, Some(3));
        assert_eq!(view.menu.len(), 9);

        selector
            .identity_resolved(&counter, Role::Admin, Some(Uuid::new_v4()))
            .await;
        selector
            .identity_resolved(&counter, Role::SuperAdmin, None)
            .await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            selector.state().scope(),
            Some(RoleScope::OwnBranch(branch))
        );
    }

    #[tokio::test]
    async fn super_admins_never_count() {
        let counter = CountingCounter::default();
        let mut selector = ViewSelector::new();

        let state = selector
            .identity_resolved(&counter, Role::SuperAdmin, None)
            .await;
        assert_eq!(state.menu().len(), 15);
        assert_eq!(state.scope(), Some(RoleScope::AllBranches));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn only_new_admissions_carries_the_badge() {
        let badged: Vec<_> = BRANCH_ADMIN_MENU
            .iter()
            .chain(SUPER_ADMIN_MENU.iter())
            .filter(|item| item.badge)
            .map(|item| item.text)
            .collect();
        assert_eq!(badged, ["New Admissions"]);
    }

    #[tokio::test]
    async fn the_store_counts_unverified_students_of_the_branch() {
        let store = DocumentStore::in_memory();
        let tirur = seed_branch(&store, "Tirur").await;
        for reg in ["R1", "R2"] {
            Student::admit(&store, RoleScope::AllBranches, new_student("Aysha", reg, tirur.meta.id))
                .await
                .unwrap();
        }

        let mut selector = ViewSelector::new();
        let state = selector
            .identity_resolved(&store, Role::Admin, Some(tirur.meta.id))
            .await;
        let ViewState::BranchAdmin(view) = state else {
            panic!("expected the branch admin view");
        };
        assert_eq!(view.pending_admissions, Some(2));
    }
}
