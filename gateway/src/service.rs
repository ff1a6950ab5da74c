//! Introspection and query execution against registered connections.
//!
//! Every operation resolves the connection, opens one session, runs, and
//! releases the session before returning.

use std::sync::Arc;
use std::time::Instant;

use common::errors::AppResult;
use common::models::{ColumnInfo, QueryLogMetadata, QueryParams, QueryResult, StatementOutput};
use common::utils::IdGenerator;
use tracing::{debug, info, warn};

use crate::resolver::ConnectionResolver;
use crate::session::{Session, SessionFactory};
use crate::store::{QueryLogEntry, QueryLogStore};

/// Row cap of entity previews.
pub const PREVIEW_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct QueryService {
    resolver: ConnectionResolver,
    sessions: SessionFactory,
    query_log: Option<Arc<dyn QueryLogStore>>,
}

impl QueryService {
    pub fn new(
        resolver: ConnectionResolver,
        sessions: SessionFactory,
        query_log: Option<Arc<dyn QueryLogStore>>,
    ) -> Self {
        Self {
            resolver,
            sessions,
            query_log,
        }
    }

    async fn open(&self, uid: &str) -> AppResult<Session> {
        let resolved = self.resolver.resolve(uid).await?;
        self.sessions.open(&resolved).await
    }

    pub async fn list_schemas(&self, uid: &str) -> AppResult<Vec<String>> {
        let mut session = self.open(uid).await?;
        let result = session.list_schemas().await;
        session.release().await;
        result
    }

    pub async fn list_tables(&self, uid: &str, schema: Option<&str>) -> AppResult<Vec<String>> {
        let mut session = self.open(uid).await?;
        let result = session.list_tables(schema).await;
        session.release().await;
        result
    }

    pub async fn list_columns(
        &self,
        uid: &str,
        table: &str,
        schema: Option<&str>,
    ) -> AppResult<Vec<ColumnInfo>> {
        let mut session = self.open(uid).await?;
        let result = session.list_columns(table, schema).await;
        session.release().await;
        result
    }

    /// Runs a caller-supplied statement in the context of `entity`.
    pub async fn execute(
        &self,
        uid: &str,
        entity: &str,
        params: QueryParams,
    ) -> AppResult<QueryResult> {
        let mut session = self.open(uid).await?;
        let started = Instant::now();
        let output = session.execute(&params.query, params.commit).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        session.release().await;

        self.log_query(uid, entity, &params.query, params.commit, &output, elapsed_ms)
            .await;

        let output = output?;
        info!(
            connection_id = %uid,
            entity = %entity,
            rows = output.rows.len(),
            commit = params.commit,
            elapsed_ms,
            "query executed"
        );

        Ok(
            QueryResult::from_output(output, params.query, uid, entity, elapsed_ms)
                .with_page(params.limit, params.offset),
        )
    }

    /// First rows of an entity. Embedded-file previews report declared column
    /// types from the table definition.
    pub async fn preview(&self, uid: &str, entity: &str) -> AppResult<QueryResult> {
        let query = format!("SELECT * FROM {entity}");
        let sql = format!("{query} LIMIT {PREVIEW_LIMIT}");

        let mut session = self.open(uid).await?;
        let started = Instant::now();
        let result = session.execute(&sql, true).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match result {
            Ok(mut output) if session.kind().is_embedded_file() && !output.columns.is_empty() => {
                match session.list_columns(entity, None).await {
                    Ok(declared) if !declared.is_empty() => output.columns = declared,
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, entity = %entity, "declared columns unavailable"),
                }
                Ok(output)
            }
            other => other,
        };
        session.release().await;

        let output = result?;
        Ok(QueryResult::from_output(output, query, uid, entity, elapsed_ms)
            .with_page(Some(u64::from(PREVIEW_LIMIT)), None))
    }

    async fn log_query(
        &self,
        uid: &str,
        entity: &str,
        query: &str,
        commit: bool,
        output: &AppResult<StatementOutput>,
        elapsed_ms: u64,
    ) {
        let Some(log) = &self.query_log else {
            return;
        };

        let status = match output {
            Ok(_) => "ok".to_string(),
            Err(e) => e.code().to_string(),
        };
        let entry = QueryLogEntry {
            uid: IdGenerator::query_log_id(),
            connection_id: uid.to_string(),
            query: query.to_string(),
            metadata: QueryLogMetadata {
                entity_name: entity.to_string(),
                commit,
                status,
                elapsed_ms,
            },
        };

        if let Err(e) = log.append(&entry).await {
            warn!(connection_id = %uid, error = %e, "failed to append query log");
        }
    }
}
