use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray_npy::write_npy;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::index::GalleryIndex;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 输出的 npy 文件路径
    #[arg(short, long, default_value = "gallery_feats.npy")]
    pub output: PathBuf,
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let index = GalleryIndex::load(&opts.conf_dir.index())?;
        write_npy(&self.output, &index.feats)?;
        info!("已导出 {} 行特征到 {}", index.len(), self.output.display());
        Ok(())
    }
}
