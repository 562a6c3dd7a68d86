use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;

use crate::error::{Error, Result};

/// ImageNet 归一化参数，和模型训练时的预处理保持一致
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 读取图片并预处理为模型输入张量
pub fn load_and_preprocess(path: &Path, size: u32) -> Result<Array4<f32>> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|e| Error::Decode {
        path: path.display().to_string(),
        cause: e.to_string(),
    })?;
    Ok(preprocess(&img, size))
}

/// 解码内存中的图片数据，用于处理上传的查询图片
pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| Error::Decode { path: "<upload>".to_string(), cause: e.to_string() })
}

/// 把图片转换为 NCHW 格式的 `[1, 3, size, size]` 张量
///
/// 短边缩放到 `size` 保持宽高比，再中心裁剪，像素值缩放到 `[0, 1]` 后
/// 按 ImageNet 均值方差归一化。
pub fn preprocess(img: &DynamicImage, size: u32) -> Array4<f32> {
    let (w, h) = (img.width(), img.height());

    let scale = size as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32) * scale).round().max(1.0) as u32;
    let new_h = ((h as f32) * scale).round().max(1.0) as u32;
    let resized = img.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

    let start_x = (resized.width().saturating_sub(size)) / 2;
    let start_y = (resized.height().saturating_sub(size)) / 2;

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for y in 0..size as usize {
        for x in 0..size as usize {
            let px = resized.get_pixel(
                (start_x + x as u32).min(resized.width() - 1),
                (start_y + y as u32).min(resized.height() - 1),
            );
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;

    #[test]
    fn tensor_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let tensor = preprocess(&img, 32);
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn black_image_normalizes_to_negative_mean() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let tensor = preprocess(&img, 8);
        let expected = (0.0 - MEAN[0]) / STD[0];
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode_bytes(b"not an image"), Err(Error::Decode { .. })));
    }

    #[test]
    fn empty_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(load_and_preprocess(&path, 32), Err(Error::Decode { .. })));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.jpg");
        assert!(matches!(load_and_preprocess(&path, 32), Err(Error::NotFound(_))));
    }
}
