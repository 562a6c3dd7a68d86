use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::ProgressBar;
use log::{info, warn};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::{FeatureExtractor, extract_feature};
use crate::utils::pb_style_speed;

/// 建库时每处理多少张图片输出一次进度日志
const LOG_INTERVAL: usize = 100;

/// 图库特征索引
///
/// `feats` 的第 i 行是 `paths[i]` 对应图片的 L2 归一化特征向量，
/// 两者的顺序在构建完成后不再变化。
#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryIndex {
    pub feats: Array2<f32>,
    pub paths: Vec<String>,
}

impl GalleryIndex {
    /// 索引中的图片数量
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// 特征向量维数
    pub fn dim(&self) -> usize {
        self.feats.ncols()
    }

    /// 第 i 行特征向量
    pub fn feat(&self, i: usize) -> ArrayView1<'_, f32> {
        self.feats.row(i)
    }

    /// 按扫描顺序逐张提取特征并构建索引
    ///
    /// 单张图片的解码或推理失败只会跳过该图片，不会中断整个批次；
    /// 跳过的图片不占行，也不出现在 `paths` 中。
    /// 一张图片都没有成功时返回 [`Error::EmptyIndex`]。
    pub fn build(
        extractor: &mut dyn FeatureExtractor,
        paths: &[PathBuf],
        input_size: u32,
    ) -> Result<Self> {
        info!("开始为 {} 张图片构建索引", paths.len());

        let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style_speed());
        let start = Instant::now();

        let mut feats = vec![];
        let mut valid_paths = vec![];
        let mut dim = 0;

        for (i, path) in paths.iter().enumerate() {
            match extract_feature(extractor, path, input_size) {
                Ok(feat) => {
                    // 维数突变说明模型输出异常，同样按单张失败处理
                    if dim != 0 && feat.len() != dim {
                        pb.println(format!("特征维数异常，跳过: {}", path.display()));
                    } else {
                        dim = feat.len();
                        feats.extend(feat);
                        valid_paths.push(path.display().to_string());
                    }
                }
                Err(e) => {
                    pb.println(format!("提取特征失败，跳过: {}", e));
                }
            }
            pb.inc(1);

            if (i + 1) % LOG_INTERVAL == 0 {
                let speed = (i + 1) as f64 / start.elapsed().as_secs_f64();
                let remaining = (paths.len() - i - 1) as f64 / speed;
                info!(
                    "已处理 {}/{} | {:.1} 张/秒 | 预计剩余 {:.1} 分钟",
                    i + 1,
                    paths.len(),
                    speed,
                    remaining / 60.0
                );
            }
        }

        pb.finish_and_clear();

        if valid_paths.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let feats = Array2::from_shape_vec((valid_paths.len(), dim), feats)
            .expect("feature matrix shape mismatch");
        info!("索引构建完成，共 {} 张图片，跳过 {} 张", valid_paths.len(), paths.len() - valid_paths.len());

        Ok(Self { feats, paths: valid_paths })
    }

    /// 把索引持久化到文件
    ///
    /// 先写临时文件再重命名，避免中途失败留下半个索引
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_file = path.to_path_buf();
        tmp_file.set_extension("tmp");

        let data = bincode::serialize(self).map_err(|e| Error::Corrupt(e.to_string()))?;
        std::fs::write(&tmp_file, data)?;
        std::fs::rename(&tmp_file, path)?;

        info!("索引已保存到 {}", path.display());
        Ok(())
    }

    /// 从文件加载索引
    ///
    /// 文件无法解析或行数与路径数不一致时返回 [`Error::Corrupt`]，
    /// 调用方应当把它当作「重新建库」信号而不是致命错误。
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path)?;
        let index: GalleryIndex =
            bincode::deserialize(&data).map_err(|e| Error::Corrupt(e.to_string()))?;

        if index.feats.nrows() != index.paths.len() {
            return Err(Error::Corrupt(format!(
                "特征矩阵 {} 行，路径列表 {} 条",
                index.feats.nrows(),
                index.paths.len()
            )));
        }
        if index.is_empty() {
            return Err(Error::Corrupt("索引为空".to_string()));
        }

        info!("已加载索引，共 {} 张图片", index.len());
        Ok(index)
    }

    /// 索引文件是否已经存在
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }
}

/// 尝试加载索引，损坏时用 `rebuild` 重新构建
///
/// 只有 [`Error::Corrupt`] 会触发重建，其他错误原样上抛。
pub fn load_or_rebuild(
    path: &Path,
    rebuild: impl FnOnce() -> Result<GalleryIndex>,
) -> Result<GalleryIndex> {
    match GalleryIndex::load(path) {
        Ok(index) => Ok(index),
        Err(Error::Corrupt(e)) => {
            warn!("索引文件损坏（{}），正在重新构建", e);
            rebuild()
        }
        Err(Error::NotFound(_)) => rebuild(),
        Err(e) => Err(e),
    }
}
