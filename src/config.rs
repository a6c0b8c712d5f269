use crate::error::{BadEnvVarSnafu, ParsePortSnafu, RegistrarResult, UnknownStoreBackendSnafu};
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::{str::FromStr, sync::Arc};

pub const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StoreBackendKind {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackendKind {
    type Err = crate::error::RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => UnknownStoreBackendSnafu {
                found: s.to_string(),
            }
            .fail(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    server_ip: String,
    store_backend: StoreBackendKind,
    ///only read when the postgres backend is picked
    db_config: Option<Arc<DbConfig>>,
}

impl RuntimeConfiguration {
    pub fn new() -> RegistrarResult<Self> {
        let server_ip = var("REGISTRAR_SERVER_IP").unwrap_or_else(|_| DEFAULT_SERVER_IP.to_string());
        let store_backend = match var("REGISTRAR_STORE") {
            Ok(kind) => kind.parse()?,
            Err(_) => StoreBackendKind::default(),
        };
        let db_config = match store_backend {
            StoreBackendKind::Postgres => Some(Arc::new(DbConfig::new()?)),
            StoreBackendKind::Memory => None,
        };

        Ok(Self {
            server_ip,
            store_backend,
            db_config,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            server_ip: DEFAULT_SERVER_IP.to_string(),
            store_backend: StoreBackendKind::Memory,
            db_config: None,
        }
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub const fn store_backend(&self) -> StoreBackendKind {
        self.store_backend
    }

    pub fn db_config(&self) -> Option<Arc<DbConfig>> {
        self.db_config.clone()
    }
}

#[derive(Debug)]
pub struct DbConfig {
    user: String,
    password: SecretString,
    path: String,
    port: u16,
    database: String,
}

impl DbConfig {
    pub fn new() -> RegistrarResult<Self> {
        let get_env_var = |name| var(name).context(BadEnvVarSnafu { name });

        Ok(Self {
            user: get_env_var("DB_USER")?,
            password: SecretString::from(get_env_var("DB_PASSWORD")?),
            path: get_env_var("DB_PATH")?,
            port: get_env_var("DB_PORT")?.parse().context(ParsePortSnafu)?,
            database: get_env_var("DB_NAME")?,
        })
    }

    pub fn get_db_path(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.path,
            self.port,
            self.database
        )
    }
}
