use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts};
use crate::extract::OnnxExtractor;
use crate::index::GalleryIndex;
use crate::scan::scan_gallery;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    /// 图库所在目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
    /// 索引收录的图片数量上限，超出部分按扫描顺序丢弃
    #[arg(long, value_name = "N", default_value_t = 10000)]
    pub max_images: usize,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let paths = scan_gallery(&self.path, &self.suffix, Some(self.max_images))?;
        if paths.is_empty() {
            bail!("目录 {} 中没有找到任何图片", self.path.display());
        }
        info!("共发现 {} 张图片", paths.len());

        let mut extractor = OnnxExtractor::from_opts(&self.model, &opts.conf_dir)?;

        let index = block_in_place(|| {
            GalleryIndex::build(&mut extractor, &paths, self.model.input_size)
        })?;
        index.save(&opts.conf_dir.index())?;

        Ok(())
    }
}
