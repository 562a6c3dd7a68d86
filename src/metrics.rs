use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "vi_search_count",
        "count of the search requests",
        &["top_k"]
    )
    .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vi_search_duration",
        "duration of the per-image search in seconds",
        &["top_k"]
    )
    .unwrap()
});

static METRIC_SEARCH_MAX_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vi_search_max_score",
        "max cosine score of the per-image search",
        &["top_k"],
        (0..=20).map(|x| x as f64 / 20.0).collect()
    )
    .unwrap()
});

/// 记录一次搜索请求
pub fn observe_search(top_k: usize, duration: f32, max_score: Option<f32>) {
    let top_k = top_k.to_string();

    METRIC_SEARCH_COUNT.with_label_values(&[&top_k]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[&top_k]).observe(duration as f64);
    if let Some(score) = max_score {
        METRIC_SEARCH_MAX_SCORE.with_label_values(&[&top_k]).observe(score as f64);
    }
}

/// 以 prometheus 文本格式导出全部指标
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&prometheus::gather()).unwrap_or_default()
}
