//! SQL 查询与元数据网关
//!
//! Registers data source connections (SQLite files from the bucket,
//! PostgreSQL, MySQL, generic APIs), introspects their catalogs and runs SQL
//! against them behind one HTTP interface.

pub mod bucket;
pub mod dialect;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod rows;
pub mod service;
pub mod session;
pub mod state;
pub mod store;
pub mod translate;

use axum::{middleware, routing::get, Json, Router};
use common::middleware::request_id::request_id_middleware;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "gateway";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SQL 网关 API",
        version = "0.1.0",
        description = "多数据源连接管理、元数据查询与 SQL 执行"
    ),
    paths(
        routes::health::health_check,
        routes::connections::list_connections,
        routes::connections::create_connection,
        routes::connections::get_connection,
        routes::connections::update_connection,
        routes::connections::delete_connection,
        routes::connections::list_entities,
        routes::bucket::upload_blob,
        routes::queries::list_schemas,
        routes::queries::list_tables,
        routes::queries::preview_entity,
        routes::queries::list_columns,
        routes::queries::execute_query,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::bucket::UploadForm,
        common::models::SourceKind,
        common::models::ConnectionRecord,
        common::models::CreateConnectionRequest,
        common::models::UpdateConnectionRequest,
        common::models::ConnectionList,
        common::models::BucketItem,
        common::models::NamedItem,
        common::models::SchemaList,
        common::models::TableList,
        common::models::EntityList,
        common::models::ColumnInfo,
        common::models::ColumnList,
        common::models::QueryResult,
        common::response::ApiError,
        common::response::ResponseMeta,
    )),
    tags(
        (name = "connections", description = "连接管理"),
        (name = "bucket", description = "数据库文件上传"),
        (name = "introspection", description = "元数据查询"),
        (name = "queries", description = "SQL 执行"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// Builds the full HTTP application around `state`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(&state))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
