use crate::{
    data::user::{Role, User},
    error::{
        IncorrectPermissionsSnafu, NoBranchAssignedSnafu, OutOfScopeSnafu, RegistrarError,
        RegistrarResult,
    },
    state::RegistrarState,
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use bitflags::bitflags;
use uuid::Uuid;

///set by the upstream authenticator to the id of the signed-in user
pub const USER_HEADER: &str = "x-registrar-user";

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PermissionsTarget: u16 {
        const VIEW_STUDENTS =     0b0000_0000_0001;
        const CRUD_STUDENTS =     0b0000_0000_0010;
        const VERIFY_ADMISSIONS = 0b0000_0000_0100;

        const CRUD_BRANCHES =     0b0000_0000_1000;
        const CRUD_USERS =        0b0000_0001_0000;
        const CRUD_COURSES =      0b0000_0010_0000;

        const VIEW_RESULTS =      0b0000_0100_0000;
        const ENTER_MARKS =       0b0000_1000_0000;
        const EXPORT_RESULTS =    0b0001_0000_0000;

        const IMPORT_CSVS =       0b0010_0000_0000;
        const RECOVER_DELETED =   0b0100_0000_0000;
        const MANAGE_EXAMS =      0b1000_0000_0000;

        const TRANSFER_STUDENTS = 0b0001_0000_0000_0000;
    }
}

/// Which study centres an identity may read and write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoleScope {
    AllBranches,
    OwnBranch(Uuid),
    ///an admin account that was never given a branch, sees nothing
    Unassigned,
}

impl RoleScope {
    /// The branch a query should be restricted to.
    ///
    /// `AllBranches` passes the requested branch through, with `None` meaning every branch.
    /// `OwnBranch` always resolves to the own branch, and asking for any other one is an error.
    pub fn effective_branch(self, requested: Option<Uuid>) -> RegistrarResult<Option<Uuid>> {
        match self {
            Self::AllBranches => Ok(requested),
            Self::OwnBranch(own) => match requested {
                Some(requested) if requested != own => OutOfScopeSnafu { requested }.fail(),
                _ => Ok(Some(own)),
            },
            Self::Unassigned => NoBranchAssignedSnafu.fail(),
        }
    }

    pub fn covers(self, branch: Option<Uuid>) -> bool {
        match self {
            Self::AllBranches => true,
            Self::OwnBranch(own) => branch == Some(own),
            Self::Unassigned => false,
        }
    }

    pub fn ensure_covers(self, branch: Option<Uuid>) -> RegistrarResult<()> {
        if self == Self::Unassigned {
            return NoBranchAssignedSnafu.fail();
        }
        snafu::ensure!(
            self.covers(branch),
            OutOfScopeSnafu {
                requested: branch.unwrap_or_else(Uuid::nil)
            }
        );
        Ok(())
    }
}

/// The signed-in user, as far as authorisation cares.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub branch: Option<Uuid>,
}

impl Identity {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.meta.id,
            username: user.username.clone(),
            role: user.role,
            branch: user.branch,
        }
    }

    pub fn permissions(&self) -> PermissionsTarget {
        self.role.permissions()
    }

    pub fn scope(&self) -> RoleScope {
        match (self.role, self.branch) {
            (Role::SuperAdmin, _) => RoleScope::AllBranches,
            (Role::Admin, Some(branch)) => RoleScope::OwnBranch(branch),
            (Role::Admin, None) => RoleScope::Unassigned,
        }
    }
}

pub trait AuthUtilities {
    fn can(&self, target: PermissionsTarget) -> bool;
    fn ensure_can(&self, target: PermissionsTarget) -> RegistrarResult<()>;
}

impl AuthUtilities for Identity {
    fn can(&self, target: PermissionsTarget) -> bool {
        self.permissions().contains(target)
    }

    fn ensure_can(&self, target: PermissionsTarget) -> RegistrarResult<()> {
        let found = self.permissions();
        snafu::ensure!(
            found.contains(target),
            IncorrectPermissionsSnafu {
                needed: target,
                found
            }
        );
        Ok(())
    }
}

impl AuthUtilities for Option<Identity> {
    fn can(&self, target: PermissionsTarget) -> bool {
        self.as_ref().is_some_and(|identity| identity.can(target))
    }

    fn ensure_can(&self, target: PermissionsTarget) -> RegistrarResult<()> {
        match self {
            Some(identity) => identity.ensure_can(target),
            None => Err(RegistrarError::Unauthenticated),
        }
    }
}

async fn resolve_identity(
    parts: &Parts,
    state: &RegistrarState,
) -> RegistrarResult<Option<Identity>> {
    let Some(header) = parts.headers.get(USER_HEADER) else {
        return Ok(None);
    };

    let Some(id) = header
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    else {
        warn!(?header, "Malformed user header");
        return Ok(None);
    };

    let user: Option<User> = state.lookup(id).await?;
    if user.is_none() {
        warn!(%id, "User header names an unknown user");
    }
    Ok(user.as_ref().map(Identity::from_user))
}

impl FromRequestParts<RegistrarState> for Identity {
    type Rejection = RegistrarError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RegistrarState,
    ) -> Result<Self, Self::Rejection> {
        resolve_identity(parts, state)
            .await?
            .ok_or(RegistrarError::Unauthenticated)
    }
}

impl OptionalFromRequestParts<RegistrarState> for Identity {
    type Rejection = RegistrarError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RegistrarState,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_identity(parts, state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, branch: Option<Uuid>) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "someone".to_string(),
            role,
            branch,
        }
    }

    #[test]
    fn super_admins_pick_any_branch_or_none() {
        let scope = identity(Role::SuperAdmin, None).scope();
        let picked = Uuid::new_v4();

        assert_eq!(scope.effective_branch(None).unwrap(), None);
        assert_eq!(scope.effective_branch(Some(picked)).unwrap(), Some(picked));
        assert!(scope.covers(None));
    }

    #[test]
    fn admins_are_pinned_to_their_own_branch() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = identity(Role::Admin, Some(own)).scope();

        assert_eq!(scope.effective_branch(None).unwrap(), Some(own));
        assert_eq!(scope.effective_branch(Some(own)).unwrap(), Some(own));
        assert!(matches!(
            scope.effective_branch(Some(other)),
            Err(RegistrarError::OutOfScope { requested }) if requested == other
        ));
        assert!(scope.ensure_covers(Some(own)).is_ok());
        assert!(scope.ensure_covers(None).is_err());
    }

    #[test]
    fn admins_without_a_branch_see_nothing() {
        let scope = identity(Role::Admin, None).scope();
        assert_eq!(scope, RoleScope::Unassigned);
        assert!(matches!(
            scope.effective_branch(None),
            Err(RegistrarError::NoBranchAssigned)
        ));
    }

    #[test]
    fn admins_cannot_manage_branches_or_users() {
        let admin = identity(Role::Admin, Some(Uuid::new_v4()));
        assert!(admin.can(PermissionsTarget::VERIFY_ADMISSIONS));
        assert!(!admin.can(PermissionsTarget::CRUD_BRANCHES));
        assert!(!admin.can(PermissionsTarget::TRANSFER_STUDENTS));
        assert!(matches!(
            admin.ensure_can(PermissionsTarget::CRUD_USERS),
            Err(RegistrarError::IncorrectPermissions { .. })
        ));

        let nobody: Option<Identity> = None;
        assert!(!nobody.can(PermissionsTarget::VIEW_STUDENTS));
        assert!(matches!(
            nobody.ensure_can(PermissionsTarget::VIEW_STUDENTS),
            Err(RegistrarError::Unauthenticated)
        ));
    }
}
