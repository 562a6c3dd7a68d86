use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{ModelOptions, Opts, SearchOptions};
use crate::error::Error;
use crate::extract::{OnnxExtractor, extract_feature};
use crate::index::{GalleryIndex, load_or_rebuild};
use crate::scan::scan_gallery;
use crate::search::{SearchResult, search};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 查询图片路径
    pub image: PathBuf,
    /// 图库目录，索引缺失或损坏时用于重新建库
    #[arg(short, long, value_name = "DIR")]
    pub gallery: Option<PathBuf>,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
    /// 重新建库时索引收录的图片数量上限
    #[arg(long, value_name = "N", default_value_t = 10000)]
    pub max_images: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let mut extractor = OnnxExtractor::from_opts(&self.model, &opts.conf_dir)?;

        let index_path = opts.conf_dir.index();
        let index = block_in_place(|| {
            load_or_rebuild(&index_path, || {
                let gallery = self.gallery.as_ref().ok_or_else(|| {
                    Error::NotFound(index_path.clone())
                })?;
                let paths = scan_gallery(gallery, &self.suffix, Some(self.max_images))?;
                if paths.is_empty() {
                    return Err(Error::EmptyIndex);
                }
                let index =
                    GalleryIndex::build(&mut extractor, &paths, self.model.input_size)?;
                index.save(&index_path)?;
                Ok(index)
            })
        })
        .map_err(|e| match e {
            Error::NotFound(p) if p == index_path => {
                anyhow!("索引 {} 不存在，请先运行 visearch build，或用 --gallery 指定图库目录", p.display())
            }
            e => e.into(),
        })?;

        let query = block_in_place(|| {
            extract_feature(&mut extractor, &self.image, self.model.input_size)
        })?;

        let result = search(&index, query.view(), self.search.count);
        print_result(&result, self)
    }
}

fn print_result(result: &[SearchResult], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for r in result {
                println!("{:.4}\t{}", r.score, r.path);
                if r.exact {
                    println!("      \t(精确匹配)");
                }
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => unreachable!(),
        }
    }
}
