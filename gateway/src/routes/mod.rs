//! 网关路由模块

pub mod bucket;
pub mod connections;
pub mod health;
pub mod queries;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use axum::Router;
use common::errors::{AppError, AppResult};
use common::middleware::RequestContext;
use common::response::ApiResponse;
use serde::Serialize;

use crate::state::AppState;
use crate::SERVICE_NAME;

/// 创建网关路由
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(connections::router())
        .merge(bucket::router(state.config.max_upload_bytes))
        .merge(queries::router())
}

/// Unwraps a JSON body, reporting malformed payloads through the error envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// Unwraps query-string parameters the same way.
pub(crate) fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

/// Wraps `data` in the success envelope with the request's id and timing.
pub(crate) fn respond<T: Serialize>(ctx: &RequestContext, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_context(ctx))
}
