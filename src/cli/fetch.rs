use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::fetch::{FetchClient, download_gallery, read_manifest};

#[derive(Parser, Debug, Clone)]
pub struct FetchCommand {
    /// 清单文件路径，每行第一个字段为图片 URL
    pub manifest: PathBuf,
    /// 图片保存目录
    #[arg(short, long, value_name = "DIR", default_value = "gallery_images")]
    pub output: PathBuf,
    /// 下载的目标图片数量，达到后停止
    #[arg(short, long, value_name = "N", default_value_t = 10000)]
    pub target: usize,
    /// 并发下载数
    #[arg(short, long, value_name = "N", default_value_t = 64)]
    pub jobs: usize,
    /// 单个请求的超时时间（秒）
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub timeout: u64,
}

impl SubCommandExtend for FetchCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let rows = read_manifest(&self.manifest)?;
        if rows.is_empty() {
            bail!("清单 {} 中没有任何 URL", self.manifest.display());
        }
        info!("清单加载完成，共 {} 条候选", rows.len());

        let client = FetchClient::new(Duration::from_secs(self.timeout))?;
        download_gallery(&client, rows, &self.output, Some(self.target), self.jobs).await?;

        Ok(())
    }
}
