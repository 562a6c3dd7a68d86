use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::ProgressBar;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use tokio::time::sleep;

use crate::utils::pb_style_speed;

const MAX_RETRIES: u32 = 2;
const RETRY_DELAY_MS: u64 = 500;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 下载批次的聚合统计
#[derive(Debug, Default)]
pub struct FetchReport {
    /// 本次新下载成功的图片数
    pub downloaded: usize,
    /// 因为磁盘上已存在而跳过的图片数
    pub skipped: usize,
    /// 下载或解码失败的图片数
    pub failed: usize,
}

/// 批量下载使用的 HTTP 客户端
///
/// 每个批次创建一个实例并显式传递，不使用进程级的全局连接池；
/// 重试策略只针对瞬时错误（连接失败、429、5xx），线性退避。
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("无法创建 HTTP 客户端")?;
        Ok(Self { client })
    }

    /// 带重试地抓取一个 URL 的内容
    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut retries = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if retries < MAX_RETRIES
                        && (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                    {
                        retries += 1;
                        sleep(Duration::from_millis(RETRY_DELAY_MS * retries as u64)).await;
                        continue;
                    }
                    if !status.is_success() {
                        anyhow::bail!("HTTP {}", status);
                    }
                    return Ok(response.bytes().await?.to_vec());
                }
                Err(_) if retries < MAX_RETRIES => {
                    retries += 1;
                    sleep(Duration::from_millis(RETRY_DELAY_MS * retries as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 幂等地确保 `id` 对应的图片存在于 `out_dir`
    ///
    /// 已存在且非空时直接跳过；下载内容必须能解码为图片且边长不小于 10，
    /// 统一转成 JPEG 保存。
    pub async fn ensure_image(&self, out_dir: &Path, id: &str, url: &str) -> Result<bool> {
        if already_have(out_dir, id) {
            return Ok(false);
        }

        let data = self.fetch_with_retry(url).await?;

        let save_path = out_dir.join(format!("{id}.jpg"));
        tokio::task::block_in_place(|| -> Result<()> {
            let img = image::load_from_memory(&data).context("解码失败")?;
            if img.width() < 10 || img.height() < 10 {
                anyhow::bail!("图片尺寸过小: {}x{}", img.width(), img.height());
            }
            img.to_rgb8().save(&save_path).context("保存失败")?;
            Ok(())
        })?;

        Ok(true)
    }
}

/// 幂等性检查：`id` 对应的图片是否已经下载过
///
/// 只认「存在且非空」，零字节的残留文件视为没有下载过
pub fn already_have(out_dir: &Path, id: &str) -> bool {
    let path = out_dir.join(format!("{id}.jpg"));
    path.metadata().map(|m| m.len() > 0).unwrap_or(false)
}

/// 读取下载清单
///
/// 跳过第一行表头，每行第一个逗号分隔字段为 URL，行号作为图片标识
pub fn read_manifest(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取清单文件 {}", path.display()))?;

    let rows = content
        .lines()
        .skip(1)
        .enumerate()
        .filter_map(|(i, line)| {
            let url = line.split(',').next()?.trim();
            if url.is_empty() { None } else { Some((i.to_string(), url.to_string())) }
        })
        .collect();
    Ok(rows)
}

/// 并发下载整个批次，凑够 `target` 张后提前停止
pub async fn download_gallery(
    client: &FetchClient,
    rows: Vec<(String, String)>,
    out_dir: &Path,
    target: Option<usize>,
    jobs: usize,
) -> Result<FetchReport> {
    std::fs::create_dir_all(out_dir)?;

    let existing = rows.iter().filter(|(id, _)| already_have(out_dir, id)).count();
    info!("磁盘上已有 {} 张图片，继续下载", existing);

    let mut report = FetchReport::default();
    let mut have = existing;

    if let Some(target) = target {
        if have >= target {
            info!("已达到目标数量 {}，无需下载", target);
            report.skipped = existing;
            return Ok(report);
        }
    }

    let pb = ProgressBar::new(rows.len() as u64).with_style(pb_style_speed());
    let start = Instant::now();

    let mut stream = futures::stream::iter(rows.into_iter().map(|(id, url)| {
        let pb = pb.clone();
        async move {
            if already_have(out_dir, &id) {
                pb.inc(1);
                return (id, Ok(false));
            }
            let result = client.ensure_image(out_dir, &id, &url).await;
            pb.inc(1);
            (id, result)
        }
    }))
    .buffer_unordered(jobs);

    while let Some((id, result)) = stream.next().await {
        match result {
            Ok(true) => {
                report.downloaded += 1;
                have += 1;
            }
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!("下载失败 {}: {}", id, e);
                report.failed += 1;
            }
        }

        if let Some(target) = target {
            if have >= target {
                info!("已达到目标数量 {}，停止下载", target);
                break;
            }
        }
    }

    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "下载完成：新增 {} 张，跳过 {} 张，失败 {} 张，平均 {:.2} 张/秒",
        report.downloaded,
        report.skipped,
        report.failed,
        report.downloaded as f64 / elapsed.max(1e-5)
    );

    Ok(report)
}
