//! 二维码文件操作：生成、列举、删除、确保目录存在。
//!
//! 文件系统即唯一数据源，这里不维护任何内存索引；所有函数都是同步的，
//! 在异步上下文中请通过 `spawn_blocking` 调用。

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use qrcode::{EcLevel, QrCode};
use uuid::Uuid;

use super::style::QrStyle;
use crate::error::QrFileError;

/// 二维码文件扩展名
pub const QR_FILE_EXTENSION: &str = ".png";

/// 输出图片的最大边长（像素）
pub const MAX_IMAGE_SIDE: u32 = 4096;

/// 将 `data` 编码为二维码并以 PNG 写入 `path`。
///
/// 版本（矩阵尺寸）自动取能容纳数据的最小值，纠错级别 M。
/// 写入先落到同目录临时文件再 rename，失败时目标文件保持原状。
pub fn generate_qr_code(data: &str, path: &Path, style: &QrStyle) -> Result<(), QrFileError> {
    tracing::debug!(target: "qr_backend::qr", "QR code generation has started: {:?}", path);

    let result = render_qr_image(data, style).and_then(|img| write_png_atomic(path, &img));
    match &result {
        Ok(()) => tracing::info!(target: "qr_backend::qr", "QR code saved successfully to: {:?}", path),
        Err(e) => {
            tracing::error!(target: "qr_backend::qr", "Failed to generate or save QR code {:?}: {}", path, e)
        }
    }
    result
}

/// 渲染二维码位图（含 `border` 个模块宽的空白边框）
pub fn render_qr_image(data: &str, style: &QrStyle) -> Result<RgbImage, QrFileError> {
    let resolved = style.resolve()?;
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;

    let side = (code.width() as u32)
        .checked_add(resolved.border.saturating_mul(2))
        .and_then(|modules| modules.checked_mul(resolved.box_size))
        .filter(|px| *px <= MAX_IMAGE_SIDE)
        .ok_or_else(|| {
            QrFileError::InvalidStyle(format!("生成的图片超过 {MAX_IMAGE_SIDE}px 上限"))
        })?;

    // qrcode 自带的 quiet zone 固定为 4 个模块，这里关闭后自行补边
    let body = code
        .render::<Rgb<u8>>()
        .quiet_zone(false)
        .module_dimensions(resolved.box_size, resolved.box_size)
        .dark_color(resolved.fill)
        .light_color(resolved.back)
        .build();

    let margin = i64::from(resolved.border * resolved.box_size);
    let mut canvas: RgbImage = ImageBuffer::from_pixel(side, side, resolved.back);
    image::imageops::overlay(&mut canvas, &body, margin, margin);
    Ok(canvas)
}

fn write_png_atomic(path: &Path, img: &RgbImage) -> Result<(), QrFileError> {
    let file_name = path.file_name().ok_or_else(|| QrFileError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "目标路径缺少文件名"),
    })?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = dir.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let written = (|| -> Result<(), QrFileError> {
        let file = File::create(&tmp).map_err(|e| QrFileError::from_io(path, e))?;
        let mut writer = BufWriter::new(file);
        img.write_to(&mut writer, ImageFormat::Png)?;
        let file = writer
            .into_inner()
            .map_err(|e| QrFileError::from_io(path, e.into_error()))?;
        file.sync_all().map_err(|e| QrFileError::from_io(path, e))?;
        fs::rename(&tmp, path).map_err(|e| QrFileError::from_io(path, e))
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// 列出目录下（非递归）所有 `.png` 文件名，按名称排序。
pub fn list_qr_codes(dir: &Path) -> Result<Vec<String>, QrFileError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        let err = QrFileError::from_io(dir, e);
        match &err {
            QrFileError::NotFound { .. } => {
                tracing::error!("Directory is not available: {:?}", dir)
            }
            other => tracing::error!("An OS error occurred while listing the QR codes: {}", other),
        }
        err
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            tracing::error!("An OS error occurred while listing the QR codes: {}", e);
            QrFileError::from_io(dir, e)
        })?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(QR_FILE_EXTENSION) && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// 删除指定的二维码文件；路径不是已存在的普通文件时返回 NotFound。
pub fn delete_qr_code(path: &Path) -> Result<(), QrFileError> {
    tracing::debug!("File path: {:?}", path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !path.is_file() {
        tracing::error!("QR code {} not found for deletion", name);
        return Err(QrFileError::NotFound {
            path: path.to_path_buf(),
        });
    }

    fs::remove_file(path).map_err(|e| {
        tracing::error!("Failed to delete QR code {}: {}", name, e);
        QrFileError::from_io(path, e)
    })?;
    tracing::info!("QR code {} deleted successfully", name);
    Ok(())
}

/// 创建目录及其所有缺失的父目录；目录已存在时视为成功。
pub fn create_directory(dir: &Path) -> Result<(), QrFileError> {
    tracing::debug!("Attempting to create directory: {:?}", dir);
    if dir.is_dir() {
        tracing::info!("Directory already exists: {:?}", dir);
        return Ok(());
    }

    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        // 并发创建时另一方可能先一步完成
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {
            tracing::info!("Directory already exists: {:?}", dir);
            Ok(())
        }
        Err(e) => {
            let err = QrFileError::from_io(dir, e);
            match &err {
                QrFileError::PermissionDenied { .. } => tracing::error!(
                    "Permission denied when trying to create directory {:?}: {}",
                    dir,
                    err
                ),
                _ => tracing::error!("Unexpected error creating directory {:?}: {}", dir, err),
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("qr_service_{}", Uuid::new_v4().simple()));
            fs::create_dir_all(&dir).expect("create scratch dir");
            Self(dir)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn generate_then_list_contains_file() {
        let dir = ScratchDir::new();
        let path = dir.0.join("hello.png");
        generate_qr_code("hello", &path, &QrStyle::default()).expect("generate");

        let names = list_qr_codes(&dir.0).expect("list");
        assert_eq!(names, vec!["hello.png".to_string()]);

        let img = image::open(&path).expect("decode png").to_rgb8();
        // 左上角位于边框内，应为背景色
        assert_eq!(*img.get_pixel(0, 0), Rgb([255, 255, 255]));
        // 边框之后第一个模块是定位图形的深色模块
        assert_eq!(*img.get_pixel(50, 50), Rgb([255, 0, 0]));
    }

    #[test]
    fn image_side_follows_version_border_and_box_size() {
        let img = render_qr_image("hello", &QrStyle::default()).expect("render");
        // 短数据落在版本 1（21 模块），两侧各 5 模块边框，每模块 10px
        assert_eq!(img.width(), (21 + 2 * 5) * 10);
        assert_eq!(img.width(), img.height());
    }

    #[test]
    fn longer_payload_grows_version() {
        let short = render_qr_image("a", &QrStyle::default()).expect("short");
        let long = render_qr_image(&"x".repeat(1000), &QrStyle::default()).expect("long");
        assert!(long.width() > short.width());
    }

    #[test]
    fn oversized_payload_fails_deterministically_without_leaving_files() {
        let dir = ScratchDir::new();
        let path = dir.0.join("too_long.png");
        let data = "x".repeat(8000);
        for _ in 0..2 {
            let err = generate_qr_code(&data, &path, &QrStyle::default()).unwrap_err();
            assert!(matches!(err, QrFileError::DataTooLong), "got {err:?}");
        }
        assert!(!path.exists());
        assert_eq!(fs::read_dir(&dir.0).unwrap().count(), 0);
    }

    #[test]
    fn empty_payload_renders_smallest_version() {
        let img = render_qr_image("", &QrStyle::default()).expect("render empty");
        assert_eq!(img.width(), (21 + 2 * 5) * 10);

        let dir = ScratchDir::new();
        let path = dir.0.join("empty.png");
        generate_qr_code("", &path, &QrStyle::default()).expect("generate empty");
        assert_eq!(list_qr_codes(&dir.0).unwrap(), vec!["empty.png".to_string()]);
    }

    #[test]
    fn largest_version_respects_image_side_cap() {
        // 2300 字节只能放进版本 40（177 模块）
        let data = "x".repeat(2300);
        let img = render_qr_image(&data, &QrStyle::default()).expect("default size fits");
        assert_eq!(img.width(), (177 + 2 * 5) * 10);

        let big = QrStyle {
            box_size: 30,
            ..QrStyle::default()
        };
        let err = render_qr_image(&data, &big).unwrap_err();
        assert!(matches!(err, QrFileError::InvalidStyle(_)), "got {err:?}");
    }

    #[test]
    fn failed_write_keeps_existing_file() {
        let dir = ScratchDir::new();
        let path = dir.0.join("keep.png");
        fs::write(&path, b"original").unwrap();

        let bad = QrStyle {
            fill_color: "nope".into(),
            ..QrStyle::default()
        };
        assert!(generate_qr_code("data", &path, &bad).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[test]
    fn generate_into_missing_directory_is_not_found() {
        let dir = ScratchDir::new();
        let path = dir.0.join("missing").join("a.png");
        let err = generate_qr_code("data", &path, &QrStyle::default()).unwrap_err();
        assert!(matches!(err, QrFileError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn delete_removes_file_and_list_no_longer_contains_it() {
        let dir = ScratchDir::new();
        let path = dir.0.join("gone.png");
        generate_qr_code("bye", &path, &QrStyle::default()).expect("generate");

        delete_qr_code(&path).expect("delete");
        assert!(!path.exists());
        assert!(list_qr_codes(&dir.0).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_file_is_not_found() {
        let dir = ScratchDir::new();
        let err = delete_qr_code(&dir.0.join("nope.png")).unwrap_err();
        assert!(matches!(err, QrFileError::NotFound { .. }));
    }

    #[test]
    fn delete_directory_is_not_found() {
        let dir = ScratchDir::new();
        let err = delete_qr_code(&dir.0).unwrap_err();
        assert!(matches!(err, QrFileError::NotFound { .. }));
        assert!(dir.0.is_dir());
    }

    #[test]
    fn list_skips_non_png_and_subdirectories() {
        let dir = ScratchDir::new();
        fs::write(dir.0.join("b.png"), b"x").unwrap();
        fs::write(dir.0.join("a.png"), b"x").unwrap();
        fs::write(dir.0.join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.0.join("nested.png")).unwrap();
        fs::write(dir.0.join("nested.png").join("c.png"), b"x").unwrap();

        let names = list_qr_codes(&dir.0).unwrap();
        assert_eq!(names, vec!["a.png".to_string(), "b.png".to_string()]);
    }

    #[test]
    fn list_missing_directory_is_not_found() {
        let dir = ScratchDir::new();
        let err = list_qr_codes(&dir.0.join("absent")).unwrap_err();
        assert!(matches!(err, QrFileError::NotFound { .. }));
    }

    #[test]
    fn create_directory_is_idempotent() {
        let dir = ScratchDir::new();
        let nested = dir.0.join("a").join("b").join("c");
        create_directory(&nested).expect("first create");
        create_directory(&nested).expect("second create");
        assert!(nested.is_dir());
    }

    #[test]
    fn create_directory_over_file_fails() {
        let dir = ScratchDir::new();
        let file = dir.0.join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(create_directory(&file).is_err());
    }
}
