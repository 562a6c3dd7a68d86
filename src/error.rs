use std::path::PathBuf;

use thiserror::Error;

/// 索引/搜索核心的错误分类（spec §7）。
#[derive(Error, Debug)]
pub enum Error {
    /// 图片文件无法解码。
    #[error("无法解码图片 {path}: {cause}")]
    Decode { path: String, cause: String },

    /// 模型/适配器在给定输入上失败。
    #[error("特征提取失败: {0}")]
    Extraction(String),

    /// 索引构建没有产生任何有效行。
    #[error("索引为空：没有有效图片")]
    EmptyIndex,

    /// 持久化的索引文件结构校验失败，需要重建。
    #[error("索引文件损坏: {0}")]
    Corrupt(String),

    /// 引用的路径（查询图片、权重、索引文件、图库目录）不存在。
    #[error("路径不存在: {0}")]
    NotFound(PathBuf),

    /// 底层 IO 错误。
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
