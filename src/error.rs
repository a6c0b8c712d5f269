use crate::{auth::PermissionsTarget, store::Collection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use snafu::Snafu;
use std::num::ParseIntError;
use uuid::Uuid;

pub type RegistrarResult<T> = Result<T, RegistrarError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistrarError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error querying the {} collection", collection))]
    MakeQuery {
        source: sqlx::Error,
        collection: Collection,
    },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Stored {} document could not be read", collection))]
    DecodeDocument {
        source: serde_json::Error,
        collection: Collection,
    },
    #[snafu(display("{} document could not be written", collection))]
    EncodeDocument {
        source: serde_json::Error,
        collection: Collection,
    },
    #[snafu(display("Invalid `{}`: {}", field, reason))]
    ValidationFailed {
        field: &'static str,
        reason: String,
    },
    #[snafu(display("Unable to find {} with ID: {}", collection, id))]
    NotFound { collection: Collection, id: Uuid },
    #[snafu(display("No authenticated user on this request"))]
    Unauthenticated,
    #[snafu(display("Tried to {:?}, only had {:?}", needed.iter_names().map(|(n, _)| n).collect::<Vec<_>>(), found.iter_names().map(|(n, _)| n).collect::<Vec<_>>()))]
    IncorrectPermissions {
        needed: PermissionsTarget,
        found: PermissionsTarget,
    },
    #[snafu(display("Study centre {} is outside of this account's scope", requested))]
    OutOfScope { requested: Uuid },
    #[snafu(display("This account has no study centre assigned"))]
    NoBranchAssigned,
    #[snafu(display("A super admin already exists"))]
    AlreadyOnboarded,
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse IP port"))]
    ParsePort { source: ParseIntError },
    #[snafu(display("Unknown store backend {:?}", found))]
    UnknownStoreBackend { found: String },
    #[snafu(display("Error with hashing/password verification"))]
    Bcrypt { source: bcrypt::BcryptError },
    #[snafu(display("Background task failed"))]
    JoinTask { source: tokio::task::JoinError },
    #[snafu(display("Error with multipart form input"))]
    Multipart {
        source: axum::extract::multipart::MultipartError,
    },
    #[snafu(display("Error with CSVs"))]
    Csv { source: csv::Error },
    #[snafu(display("Error finishing CSV export"))]
    CsvFlush { source: std::io::Error },
    #[snafu(display("Error building spreadsheet"))]
    Xlsx {
        source: rust_xlsxwriter::XlsxError,
    },
}

impl IntoResponse for RegistrarError {
    #[allow(clippy::match_same_arms)]
    fn into_response(self) -> Response {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const NA: StatusCode = StatusCode::FORBIDDEN; //not allowed
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        let status_code = match &self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { source, .. } => match source {
                sqlx::Error::RowNotFound => NF,
                _ => ISE,
            },
            Self::DecodeDocument { .. } | Self::EncodeDocument { .. } => ISE,
            Self::ValidationFailed { .. } => BI,
            Self::NotFound { .. } => NF,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::IncorrectPermissions { .. } => NA,
            Self::OutOfScope { .. } | Self::NoBranchAssigned => NA,
            Self::AlreadyOnboarded => StatusCode::CONFLICT,
            Self::BadEnvVar { .. } => ISE,
            Self::ParsePort { .. } => ISE,
            Self::UnknownStoreBackend { .. } => ISE,
            Self::Bcrypt { .. } | Self::JoinTask { .. } => ISE,
            Self::Multipart { source } => source.status(),
            Self::Csv { .. } => BI,
            Self::CsvFlush { .. } => ISE,
            Self::Xlsx { .. } => ISE,
        };

        error!(?self, "Error!");
        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

