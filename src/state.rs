use crate::{
    auth::Identity,
    config::RuntimeConfiguration,
    error::RegistrarResult,
    graph::{RegistrarSchema, build_schema},
    maud_conveniences::render_nav,
    store::{DocumentStore, postgres::PostgresBackend},
};
use maud::{DOCTYPE, Markup, html};
use sqlx::postgres::PgPoolOptions;
use std::ops::Deref;

#[derive(Clone)]
pub struct RegistrarState {
    store: DocumentStore,
    schema: RegistrarSchema,
    config: RuntimeConfiguration,
}

impl std::fmt::Debug for RegistrarState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrarState")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RegistrarState {
    pub async fn new(options: PgPoolOptions, config: RuntimeConfiguration) -> RegistrarResult<Self> {
        //a db config is only read when the postgres backend was picked
        let store = match config.db_config() {
            Some(db_config) => DocumentStore::new(PostgresBackend::new(options, &db_config).await?),
            None => DocumentStore::in_memory(),
        };

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: DocumentStore, config: RuntimeConfiguration) -> Self {
        let schema = build_schema(store.clone());
        Self {
            store,
            schema,
            config,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::with_store(DocumentStore::in_memory(), RuntimeConfiguration::in_memory())
    }

    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub const fn schema(&self) -> &RegistrarSchema {
        &self.schema
    }

    pub const fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    #[allow(clippy::unused_self)]
    pub fn render(&self, identity: Option<&Identity>, markup: Markup) -> Markup {
        let nav = render_nav(identity);

        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="UTF-8" {}
                    meta name="viewport" content="width=device-width, initial-scale=1.0" {}
                    script src="https://unpkg.com/htmx.org@2.0.4" integrity="sha384-HGfztofotfshcF7+8n44JQL2oJmowVChPTg48S+jvZoztPfvwD79OC/LTtG6dMp+" crossorigin="anonymous" {}
                    script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                    title { "Registrar" }
                }
                body class="bg-gray-900 min-h-screen flex flex-col items-center pt-20 text-white" {
                    (nav)
                    div id="notifications" class="fixed bottom-4 right-4 flex flex-col space-y-2" {}
                    (markup)
                }
            }
        }
    }

    pub async fn sensible_shutdown(&self) {
        self.store.close().await;
    }
}

impl Deref for RegistrarState {
    type Target = DocumentStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::StoreBackendKind, data::user::User, store::Filter};

    #[tokio::test]
    async fn memory_configuration_never_touches_postgres() {
        let config = RuntimeConfiguration::in_memory();
        assert_eq!(config.store_backend(), StoreBackendKind::Memory);
        assert!(config.db_config().is_none());

        let state = RegistrarState::new(PgPoolOptions::new(), config).await.unwrap();
        assert_eq!(state.count::<User>(Filter::new()).await.unwrap(), 0);
    }
}
