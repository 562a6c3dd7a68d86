use std::path::Path;

use log::info;
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;

use crate::config::{ConfDir, ModelOptions};
use crate::error::{Error, Result};
use crate::preprocess;

/// 特征提取器抽象
///
/// 嵌入模型对索引和搜索核心完全不透明，任何满足「预处理张量进，定长向量出」
/// 的实现都可以替换默认的 ONNX 模型。
pub trait FeatureExtractor: Send {
    /// 对单张预处理后的图片计算原始特征向量
    fn extract(&mut self, tensor: Array4<f32>) -> Result<Array1<f32>>;
}

/// 基于 ONNX Runtime 的视觉编码器
pub struct OnnxExtractor {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxExtractor {
    /// 从 ONNX 文件加载模型
    pub fn load(path: &Path, intra_threads: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }

        info!("正在加载模型: {}", path.display());
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(intra_threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "last_hidden_state".to_string());
        info!("模型加载完成");

        Ok(Self { session, input_name, output_name })
    }

    /// 按命令行选项加载模型
    pub fn from_opts(opts: &ModelOptions, conf_dir: &ConfDir) -> Result<Self> {
        Self::load(&opts.model_path(conf_dir), opts.intra_threads)
    }
}

impl FeatureExtractor for OnnxExtractor {
    fn extract(&mut self, tensor: Array4<f32>) -> Result<Array1<f32>> {
        let input = Tensor::from_array(tensor).map_err(|e| Error::Extraction(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| Error::Extraction(format!("模型没有输出 {}", self.output_name)))?;
        let (_, data) =
            output.try_extract_tensor::<f32>().map_err(|e| Error::Extraction(e.to_string()))?;

        if data.is_empty() || data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Extraction("模型输出包含非法值".to_string()));
        }

        Ok(Array1::from(data.to_vec()))
    }
}

/// 对特征向量做 L2 归一化
///
/// 分母加上一个小 epsilon，零向量不会产生除零
pub fn normalize(feat: &mut Array1<f32>) {
    let norm = feat.dot(feat).sqrt();
    feat.mapv_inplace(|x| x / (norm + 1e-6));
}

/// 提取单张图片的归一化特征向量
///
/// 读取、预处理、推理和归一化中的任何失败都会以 [`Error`] 返回，
/// 由调用方决定是跳过（建库）还是上抛（查询）。
pub fn extract_feature(
    extractor: &mut dyn FeatureExtractor,
    path: &Path,
    input_size: u32,
) -> Result<Array1<f32>> {
    let tensor = preprocess::load_and_preprocess(path, input_size)?;
    let mut feat = extractor.extract(tensor)?;
    normalize(&mut feat);
    Ok(feat)
}
