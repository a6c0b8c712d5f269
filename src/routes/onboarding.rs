use crate::{
    data::user::{NewUser, Role, User},
    error::{AlreadyOnboardedSnafu, RegistrarResult},
    state::RegistrarState,
    store::Filter,
};
use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct FirstSuperAdminForm {
    username: String,
    email: String,
    #[serde(default)]
    phone: String,
    password: Option<SecretString>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Onboarded {
    user: User,
    generated_password: Option<String>,
}

///creates the first super admin, only while there are no users at all
pub async fn post_first_super_admin(
    State(state): State<RegistrarState>,
    Json(FirstSuperAdminForm {
        username,
        email,
        phone,
        password,
    }): Json<FirstSuperAdminForm>,
) -> RegistrarResult<(StatusCode, Json<Onboarded>)> {
    snafu::ensure!(
        state.count::<User>(Filter::new()).await? == 0,
        AlreadyOnboardedSnafu
    );

    let (mut user, generated) = User::insert_into_database(
        &state,
        NewUser {
            username,
            email,
            phone,
            role: Role::SuperAdmin,
            branch: None,
            password,
        },
    )
    .await?;
    user.password_hash = None;
    warn!(id = %user.meta.id, "Onboarded first super admin");

    Ok((
        StatusCode::CREATED,
        Json(Onboarded {
            user,
            generated_password: generated.map(|p| p.expose_secret().to_string()),
        }),
    ))
}
