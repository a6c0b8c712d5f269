use crate::{
    config::DbConfig,
    error::{
        GetDatabaseConnectionSnafu, MakeQuerySnafu, MigrateSnafu, OpenDatabaseSnafu,
        RegistrarResult,
    },
    store::{Collection, Condition, DocumentBackend, Filter},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use snafu::ResultExt;
use sqlx::{
    Pool, Postgres, QueryBuilder, pool::PoolConnection, postgres::PgPoolOptions, types::Json,
};
use uuid::Uuid;

/// Every collection lives in one `documents` table as JSONB, keyed by `(collection, id)`.
///
/// Equality conditions become `body @> {field: value}` containment checks, which hit the GIN
/// index. For the scalar values filters carry, containment and equality agree.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: Pool<Postgres>,
}

impl PostgresBackend {
    pub async fn new(options: PgPoolOptions, db_config: &DbConfig) -> RegistrarResult<Self> {
        let pool = options
            .connect(&db_config.get_db_path())
            .await
            .context(OpenDatabaseSnafu)?;

        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;

        Ok(Self { pool })
    }

    async fn get_connection(&self) -> RegistrarResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)
    }

    fn containment(field: &str, value: &Value) -> Json<Value> {
        let mut object = Map::new();
        object.insert(field.to_string(), value.clone());
        Json(Value::Object(object))
    }

    fn push_conditions(builder: &mut QueryBuilder<'static, Postgres>, filter: &Filter) {
        for condition in filter.conditions() {
            match condition {
                Condition::Eq(field, value) => {
                    builder.push(" AND body @> ");
                    builder.push_bind(Self::containment(field, value));
                }
                Condition::Ne(field, value) => {
                    builder.push(" AND NOT (body @> ");
                    builder.push_bind(Self::containment(field, value));
                    builder.push(")");
                }
            }
        }
    }

    ///`SELECT body`, in insertion order unless the filter sorts
    fn select_query(collection: Collection, filter: &Filter) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT body FROM documents WHERE collection = ");
        builder.push_bind(collection.as_str());
        Self::push_conditions(&mut builder, filter);
        match filter.sort_by() {
            Some(field) => {
                builder.push(" ORDER BY body ->> ");
                builder.push_bind(field.to_string());
                builder.push(", seq");
            }
            None => {
                builder.push(" ORDER BY seq");
            }
        }
        builder
    }

    fn count_query(collection: Collection, filter: &Filter) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(collection.as_str());
        Self::push_conditions(&mut builder, filter);
        builder
    }
}

#[async_trait]
impl DocumentBackend for PostgresBackend {
    async fn find(&self, collection: Collection, filter: &Filter) -> RegistrarResult<Vec<Value>> {
        let mut conn = self.get_connection().await?;

        let rows = Self::select_query(collection, filter)
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&mut *conn)
            .await
            .context(MakeQuerySnafu { collection })?;
        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> RegistrarResult<Option<Value>> {
        let mut conn = self.get_connection().await?;

        let body = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context(MakeQuerySnafu { collection })?;
        Ok(body.map(|Json(body)| body))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> RegistrarResult<u64> {
        let mut conn = self.get_connection().await?;

        let count = Self::count_query(collection, filter)
            .build_query_scalar::<i64>()
            .fetch_one(&mut *conn)
            .await
            .context(MakeQuerySnafu { collection })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> RegistrarResult<()> {
        let mut conn = self.get_connection().await?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(id)
            .bind(Json(document))
            .execute(&mut *conn)
            .await
            .context(MakeQuerySnafu { collection })?;
        Ok(())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: Uuid,
        document: Value,
    ) -> RegistrarResult<bool> {
        let mut conn = self.get_connection().await?;

        let result =
            sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .bind(Json(document))
                .execute(&mut *conn)
                .await
                .context(MakeQuerySnafu { collection })?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, collection: Collection, id: Uuid) -> RegistrarResult<bool> {
        let mut conn = self.get_connection().await?;

        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await
            .context(MakeQuerySnafu { collection })?;
        Ok(result.rows_affected() > 0)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
