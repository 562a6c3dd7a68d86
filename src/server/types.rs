use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use utoipa::ToSchema;

use crate::search::SearchResult;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Bytes,
    pub top_k: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的查询图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的结果数量，缺省使用服务器启动参数
    pub top_k: Option<usize>,
}

/// 搜索响应
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u32,
    /// 排好序的搜索结果，格式为 `(相似度, 图片路径, 是否精确匹配)`
    pub result: Vec<SearchResult>,
}
