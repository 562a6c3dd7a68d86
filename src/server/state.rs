use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use crate::cli::ServerCommand;
use crate::config::{ModelOptions, SearchOptions};
use crate::extract::OnnxExtractor;
use crate::index::GalleryIndex;

/// 应用状态
pub struct AppState {
    /// 图库索引，reload 时整体替换
    pub index: RwLock<GalleryIndex>,
    /// 特征提取器，推理需要独占访问
    pub extractor: Mutex<OnnxExtractor>,
    /// 模型配置选项
    pub model: ModelOptions,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 索引文件路径，reload 时重新读取
    pub index_path: PathBuf,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        index: GalleryIndex,
        extractor: OnnxExtractor,
        index_path: PathBuf,
        opts: &ServerCommand,
    ) -> Arc<Self> {
        Arc::new(AppState {
            index: RwLock::new(index),
            extractor: Mutex::new(extractor),
            model: opts.model.clone(),
            search: opts.search.clone(),
            index_path,
        })
    }
}
