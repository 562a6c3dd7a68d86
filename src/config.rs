use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::Parser;
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "visearch").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "visearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// visearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 根据清单文件批量下载图片到图库目录
    Fetch(FetchCommand),
    /// 扫描图库目录并构建特征索引
    Build(BuildCommand),
    /// 以图搜图
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 导出特征矩阵
    Export(ExportCommand),
}

/// 嵌入模型相关选项
#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// ONNX 模型文件路径，默认使用配置目录下的 vit-dinov2-base.onnx
    #[arg(short, long, value_name = "FILE")]
    pub model: Option<PathBuf>,
    /// 模型输入边长，图片会被缩放裁剪到该尺寸
    #[arg(long, value_name = "SIZE", default_value_t = 224)]
    pub input_size: u32,
    /// 推理线程数
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub intra_threads: usize,
}

impl ModelOptions {
    /// 返回模型文件的实际路径
    pub fn model_path(&self, conf_dir: &ConfDir) -> PathBuf {
        self.model.clone().unwrap_or_else(|| conf_dir.model())
    }
}

/// 搜索相关选项
#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的结果数量
    #[arg(short = 'k', long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回索引文件的路径
    pub fn index(&self) -> PathBuf {
        self.path.join("gallery.idx")
    }

    /// 返回默认模型文件的路径
    pub fn model(&self) -> PathBuf {
        self.path.join("vit-dinov2-base.onnx")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
