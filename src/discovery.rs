//! # 文件发现模块
//!
//! 递归展开用户给出的文件与目录，并把其中可解码的图像打开为载体。

use crate::carrier::CarrierImage;
use crate::config::LsbConfig;
use crate::error::StegoError;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};

/// 扫描结果：可用的载体以及被拒绝的图像及原因。
#[derive(Debug, Default)]
pub struct Scan {
    pub carriers: Vec<CarrierImage>,
    pub rejected: Vec<(PathBuf, StegoError)>,
}

/// 递归列出 `paths` 下的所有文件，目录内按名称排序。
/// 无法读取的目录会被跳过并给出警告。
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        walk(path, &mut files);
    }
    files
}

fn walk(path: &Path, files: &mut Vec<PathBuf>) {
    if path.is_file() {
        files.push(path.to_path_buf());
        return;
    }
    if !path.is_dir() {
        log::warn!("Path does not exist: {}", path.display());
        return;
    }

    let mut children: Vec<PathBuf> = match fs::read_dir(path) {
        Ok(entries) => entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect(),
        Err(err) => {
            log::warn!("Access to {} was denied by the system", path.display());
            log::debug!("{err}");
            return;
        }
    };
    children.sort();
    for child in children {
        walk(&child, files);
    }
}

/// 扩展名对应一种可解码的图像格式。
pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
}

/// 打开 `paths` 下所有受支持的图像，单张图像的失败不影响其他图像。
pub fn scan_carriers(paths: &[PathBuf], config: LsbConfig) -> Scan {
    let mut scan = Scan::default();
    for path in collect_files(paths) {
        if !is_supported_image(&path) {
            log::debug!("Skipped non-image file {}", path.display());
            continue;
        }
        match CarrierImage::open(&path, config) {
            Ok(carrier) => scan.carriers.push(carrier),
            Err(err) => scan.rejected.push((path, err)),
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn walks_directories_in_sorted_order() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("b"))?;
        fs::write(dir.path().join("c.txt"), "c")?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::write(dir.path().join("b/inner.txt"), "i")?;

        let files = collect_files(&[dir.path().to_path_buf(), dir.path().join("missing")]);
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.txt"),
                Path::new("b").join("inner.txt"),
                PathBuf::from("c.txt")
            ]
        );
        Ok(())
    }

    #[test]
    fn scan_separates_usable_and_rejected_images() -> anyhow::Result<()> {
        let dir = tempdir()?;
        RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 4])).save(dir.path().join("big.png"))?;
        RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])).save(dir.path().join("tiny.png"))?;
        fs::write(dir.path().join("broken.png"), "not an image")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let scan = scan_carriers(&[dir.path().to_path_buf()], LsbConfig::default());
        assert_eq!(scan.carriers.len(), 1);
        assert_eq!(scan.carriers[0].base_name(), "big");
        assert_eq!(scan.rejected.len(), 2);
        assert!(
            scan.rejected
                .iter()
                .any(|(_, err)| matches!(err, StegoError::ImageTooSmall { .. }))
        );
        assert!(is_supported_image(Path::new("x.PNG")));
        assert!(!is_supported_image(Path::new("x.txt")));
        Ok(())
    }
}
