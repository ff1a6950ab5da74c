//! 元数据查询与 SQL 执行路由

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Extension, Json, Router,
};

use common::errors::AppError;
use common::middleware::RequestContext;
use common::models::{ColumnList, QueryParams, QueryResult, SchemaFilter, SchemaList, TableList};
use common::response::ApiResponse;

use super::{query_params, respond};
use crate::state::AppState;

/// 创建查询路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connection/{uid}/schema", get(list_schemas))
        .route("/connection/{uid}/table", get(list_tables))
        .route("/connection/{uid}/entitities/{entity}", get(preview_entity))
        .route(
            "/connection/{uid}/entitities/{entity}/columns",
            get(list_columns),
        )
        .route(
            "/connection/{uid}/entitities/{entity}/queries",
            get(execute_query),
        )
}

/// 列出 schema
///
/// 无 schema 概念的数据源（sqlite、mysql、api）返回空列表。
#[utoipa::path(
    get,
    path = "/connection/{uid}/schema",
    tag = "introspection",
    params(
        ("uid" = String, Path, description = "连接 uid")
    ),
    responses(
        (status = 200, description = "schema 列表", body = ApiResponse<SchemaList>),
        (status = 404, description = "连接未找到"),
        (status = 503, description = "数据源不可达")
    )
)]
pub async fn list_schemas(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<SchemaList>>, AppError> {
    let schemas = state.queries.list_schemas(&uid).await?;
    Ok(respond(&ctx, SchemaList::from(schemas)))
}

/// 列出表
#[utoipa::path(
    get,
    path = "/connection/{uid}/table",
    tag = "introspection",
    params(
        ("uid" = String, Path, description = "连接 uid"),
        SchemaFilter
    ),
    responses(
        (status = 200, description = "表列表", body = ApiResponse<TableList>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(uid): Path<String>,
    filter: Result<Query<SchemaFilter>, QueryRejection>,
) -> Result<Json<ApiResponse<TableList>>, AppError> {
    let filter = query_params(filter)?;
    let tables = state
        .queries
        .list_tables(&uid, filter.schema.as_deref())
        .await?;
    Ok(respond(&ctx, TableList::from(tables)))
}

/// 预览实体数据（最多 100 行）
#[utoipa::path(
    get,
    path = "/connection/{uid}/entitities/{entity}",
    tag = "introspection",
    params(
        ("uid" = String, Path, description = "连接 uid"),
        ("entity" = String, Path, description = "实体（表）名")
    ),
    responses(
        (status = 200, description = "预览结果", body = ApiResponse<QueryResult>),
        (status = 404, description = "连接未找到"),
        (status = 500, description = "执行失败")
    )
)]
pub async fn preview_entity(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((uid, entity)): Path<(String, String)>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    let result = state.queries.preview(&uid, &entity).await?;
    Ok(respond(&ctx, result))
}

/// 列出表字段
///
/// postgres 支持 `schema.table` 形式的表名。
#[utoipa::path(
    get,
    path = "/connection/{uid}/entitities/{entity}/columns",
    tag = "introspection",
    params(
        ("uid" = String, Path, description = "连接 uid"),
        ("entity" = String, Path, description = "表名"),
        SchemaFilter
    ),
    responses(
        (status = 200, description = "字段列表", body = ApiResponse<ColumnList>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn list_columns(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((uid, entity)): Path<(String, String)>,
    filter: Result<Query<SchemaFilter>, QueryRejection>,
) -> Result<Json<ApiResponse<ColumnList>>, AppError> {
    let filter = query_params(filter)?;
    let columns = state
        .queries
        .list_columns(&uid, &entity, filter.schema.as_deref())
        .await?;
    Ok(respond(&ctx, ColumnList::from(columns)))
}

/// 执行 SQL
///
/// `commit=false` 时语句在事务中执行后回滚。`limit`/`offset` 仅原样回显，不改写 SQL。
#[utoipa::path(
    get,
    path = "/connection/{uid}/entitities/{entity}/queries",
    tag = "queries",
    params(
        ("uid" = String, Path, description = "连接 uid"),
        ("entity" = String, Path, description = "实体（表）名"),
        QueryParams
    ),
    responses(
        (status = 200, description = "执行结果", body = ApiResponse<QueryResult>),
        (status = 400, description = "请求无效"),
        (status = 401, description = "数据源认证失败"),
        (status = 404, description = "连接未找到"),
        (status = 500, description = "执行失败"),
        (status = 503, description = "数据源不可达")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((uid, entity)): Path<(String, String)>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    let params = query_params(params)?;
    let result = state.queries.execute(&uid, &entity, params).await?;
    Ok(respond(&ctx, result))
}
