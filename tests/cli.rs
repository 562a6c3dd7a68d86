use std::fs;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn build_empty_gallery_fails() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let gallery = assert_fs::TempDir::new()?;

    cargo_run!("visearch", "-c", conf_dir.path(), "build", gallery.path())
        .failure()
        .stderr(predicate::str::contains("没有找到任何图片"));

    Ok(())
}

#[test]
fn build_missing_gallery_fails() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;

    cargo_run!("visearch", "-c", conf_dir.path(), "build", "/definitely/not/a/dir")
        .failure()
        .stderr(predicate::str::contains("文件不存在"));

    Ok(())
}

#[test]
fn build_missing_model_fails() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let gallery = assert_fs::TempDir::new()?;

    // 图库非空，但配置目录中没有模型文件
    let img = image::RgbImage::new(16, 16);
    img.save(gallery.path().join("0.jpg"))?;

    cargo_run!("visearch", "-c", conf_dir.path(), "build", gallery.path())
        .failure()
        .stderr(predicate::str::contains("文件不存在"));

    Ok(())
}

#[test]
fn export_without_index_fails() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;

    cargo_run!("visearch", "-c", conf_dir.path(), "export")
        .failure()
        .stderr(predicate::str::contains("文件不存在"));

    Ok(())
}

#[rstest]
#[case::missing_manifest("nope.csv", "无法读取清单文件")]
#[case::empty_manifest("empty.csv", "没有任何 URL")]
fn fetch_bad_manifest_fails(#[case] name: &str, #[case] message: &str) -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let dir = assert_fs::TempDir::new()?;

    let manifest = dir.path().join(name);
    if name.starts_with("empty") {
        fs::write(&manifest, "url\n")?;
    }

    cargo_run!(
        "visearch",
        "-c",
        conf_dir.path(),
        "fetch",
        &manifest,
        "-o",
        dir.path().join("gallery")
    )
    .failure()
    .stderr(predicate::str::contains(message));

    Ok(())
}
