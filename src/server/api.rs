use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_typed_multipart::TypedMultipart;
use log::info;
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::extract::FeatureExtractor;
use crate::index::GalleryIndex;
use crate::metrics;
use crate::search::search;
use crate::{extract, preprocess};

/// 搜索一张图片
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<Value>> {
    let top_k = data.top_k.unwrap_or(state.search.count);

    info!("正在搜索上传图片");
    let start = Instant::now();

    let query = block_in_place(|| -> Result<_> {
        let img = preprocess::decode_bytes(&data.file)?;
        let tensor = preprocess::preprocess(&img, state.model.input_size);

        let mut extractor = state.extractor.lock().expect("extractor lock poisoned");
        let mut feat = extractor.extract(tensor)?;
        extract::normalize(&mut feat);
        Ok(feat)
    })?;

    let index = state.index.read().await;
    let result = search(&index, query.view(), top_k);
    drop(index);

    let elapsed = start.elapsed();
    metrics::observe_search(top_k, elapsed.as_secs_f32(), result.first().map(|r| r.score));

    Ok(Json(json!({
        "time": elapsed.as_millis() as u32,
        "result": result,
    })))
}

/// 重新从磁盘加载索引
#[utoipa::path(post, path = "/reload")]
pub async fn reload_handler(State(state): State<Arc<AppState>>) -> Result<()> {
    let index = block_in_place(|| GalleryIndex::load(&state.index_path))?;

    // NOTE: 先完成加载再替换，加载失败时旧索引继续服务
    let mut lock = state.index.write().await;
    *lock = index;
    info!("索引已重新加载，共 {} 张图片", lock.len());
    Ok(())
}

/// 导出 prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
