use std::path::{Path, PathBuf};

use log::info;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// 扫描图库目录，返回确定性排序的候选图片列表
///
/// 排序规则：先按路径字典序排序；如果所有文件名（不含扩展名）都能解析为整数，
/// 则改为按数值升序排序。两种情况都不依赖文件系统的枚举顺序。
///
/// 如果发现的图片数量超过 `max_images`，只保留排序后的前 `max_images` 张。
pub fn scan_gallery(dir: &Path, suffix: &str, max_images: Option<usize>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }

    let re_suf = format!("(?i)^({})$", suffix.replace(',', "|"));
    let re_suf = Regex::new(&re_suf).expect("failed to build regex");

    let mut entries = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| {
            entry.ok().and_then(|entry| {
                let path = entry.path();
                if path.is_file() {
                    if let Some(ext) = path.extension() {
                        if re_suf.is_match(&ext.to_string_lossy()) {
                            return Some(path.to_path_buf());
                        }
                    }
                }
                None
            })
        })
        .collect::<Vec<_>>();

    entries.sort();

    // 形如 0.jpg、1.jpg 的图库按编号排序，保证行序和下载时的清单顺序一致
    let stems: Option<Vec<u64>> =
        entries.iter().map(|p| p.file_stem()?.to_str()?.parse::<u64>().ok()).collect();
    if let Some(stems) = stems {
        let mut keyed = stems.into_iter().zip(entries).collect::<Vec<_>>();
        keyed.sort_by_key(|(n, _)| *n);
        entries = keyed.into_iter().map(|(_, p)| p).collect();
    }

    let total = entries.len();
    if let Some(max) = max_images {
        if total > max {
            info!("发现 {} 张图片，超出索引上限，只保留前 {} 张", total, max);
            entries.truncate(max);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.jpg", "2.jpg", "1.jpg", "0.jpg"] {
            touch(dir.path(), name);
        }

        let paths = scan_gallery(dir.path(), "jpg,png", None).unwrap();
        let names: Vec<_> =
            paths.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["0.jpg", "1.jpg", "2.jpg", "10.jpg"]);
    }

    #[test]
    fn lexical_order_when_not_all_numeric() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.jpg", "2.jpg", "cat.jpg"] {
            touch(dir.path(), name);
        }

        let paths = scan_gallery(dir.path(), "jpg", None).unwrap();
        let names: Vec<_> =
            paths.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        // 只要有一个文件名不是数字，整体按字典序排序
        assert_eq!(names, ["10.jpg", "2.jpg", "cat.jpg"]);
    }

    #[test]
    fn suffix_filter_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "0.JPG");
        touch(dir.path(), "1.png");
        touch(dir.path(), "2.txt");

        let paths = scan_gallery(dir.path(), "jpg,png", None).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn truncate_to_max_images() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            touch(dir.path(), &format!("{i}.jpg"));
        }

        let paths = scan_gallery(dir.path(), "jpg", Some(3)).unwrap();
        let names: Vec<_> =
            paths.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, ["0.jpg", "1.jpg", "2.jpg"]);
    }

    #[test]
    fn empty_dir_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = scan_gallery(dir.path(), "jpg", None).unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(scan_gallery(&missing, "jpg", None), Err(Error::NotFound(_))));
    }
}
