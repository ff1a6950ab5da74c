//! 连接管理路由

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};

use common::errors::AppError;
use common::middleware::RequestContext;
use common::models::{
    ConnectionList, ConnectionRecord, CreateConnectionRequest, EntityList,
    UpdateConnectionRequest,
};
use common::response::ApiResponse;

use super::{json_body, respond};
use crate::state::AppState;

/// 创建连接管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections).post(create_connection))
        .route(
            "/connections/{uid}",
            get(get_connection)
                .put(update_connection)
                .delete(delete_connection),
        )
        .route("/connections/{uid}/entities", get(list_entities))
}

/// 列出所有已注册的连接
#[utoipa::path(
    get,
    path = "/connections",
    tag = "connections",
    responses(
        (status = 200, description = "连接列表", body = ApiResponse<ConnectionList>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<ApiResponse<ConnectionList>>, AppError> {
    let records = state.registry.list().await?;
    Ok(respond(&ctx, ConnectionList::from(records)))
}

/// 注册新的数据源连接
///
/// sqlite 连接的 `connection_uri` 必须是已上传到 bucket 的文件名。
#[utoipa::path(
    post,
    path = "/connections",
    tag = "connections",
    request_body = CreateConnectionRequest,
    responses(
        (status = 200, description = "连接已创建", body = ApiResponse<ConnectionRecord>),
        (status = 400, description = "请求参数无效"),
        (status = 404, description = "bucket 中不存在该文件")
    )
)]
pub async fn create_connection(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CreateConnectionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ConnectionRecord>>, AppError> {
    let req = json_body(payload)?;
    let record = state.registry.create(req).await?;
    Ok(respond(&ctx, record))
}

/// 根据 uid 获取连接
#[utoipa::path(
    get,
    path = "/connections/{uid}",
    tag = "connections",
    params(
        ("uid" = String, Path, description = "连接 uid")
    ),
    responses(
        (status = 200, description = "连接详情", body = ApiResponse<ConnectionRecord>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<ConnectionRecord>>, AppError> {
    let record = state.registry.get(&uid).await?;
    Ok(respond(&ctx, record))
}

/// 部分更新连接
#[utoipa::path(
    put,
    path = "/connections/{uid}",
    tag = "connections",
    params(
        ("uid" = String, Path, description = "连接 uid")
    ),
    request_body = UpdateConnectionRequest,
    responses(
        (status = 200, description = "连接已更新", body = ApiResponse<ConnectionRecord>),
        (status = 404, description = "连接或文件未找到")
    )
)]
pub async fn update_connection(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(uid): Path<String>,
    payload: Result<Json<UpdateConnectionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ConnectionRecord>>, AppError> {
    let patch = json_body(payload)?;
    let record = state.registry.update(&uid, patch).await?;
    Ok(respond(&ctx, record))
}

/// 删除连接
#[utoipa::path(
    delete,
    path = "/connections/{uid}",
    tag = "connections",
    params(
        ("uid" = String, Path, description = "连接 uid")
    ),
    responses(
        (status = 204, description = "连接已删除"),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.delete(&uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 列出连接下的实体（表）
#[utoipa::path(
    get,
    path = "/connections/{uid}/entities",
    tag = "connections",
    params(
        ("uid" = String, Path, description = "连接 uid")
    ),
    responses(
        (status = 200, description = "实体列表", body = ApiResponse<EntityList>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn list_entities(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(uid): Path<String>,
) -> Result<Json<ApiResponse<EntityList>>, AppError> {
    let tables = state.queries.list_tables(&uid, None).await?;
    Ok(respond(&ctx, EntityList::from(tables)))
}
