//! 文件上传路由

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Extension, Json, Router,
};
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestContext;
use common::models::BucketItem;
use common::response::ApiResponse;

use super::respond;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/bucket", post(upload_blob))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// multipart 上传表单
#[derive(ToSchema)]
pub struct UploadForm {
    /// 数据库文件
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// 上传嵌入式数据库文件
///
/// 返回的 `uid` 即为创建 sqlite 连接时使用的 `connection_uri`。
#[utoipa::path(
    post,
    path = "/bucket",
    tag = "bucket",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "文件已保存", body = ApiResponse<BucketItem>),
        (status = 400, description = "缺少 file 字段")
    )
)]
pub async fn upload_blob(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<BucketItem>>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(e.body_text()))?;

        let item = state.bucket.upload(filename.as_deref(), &bytes).await?;
        return Ok(respond(&ctx, item));
    }

    Err(AppError::InvalidRequest(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}
