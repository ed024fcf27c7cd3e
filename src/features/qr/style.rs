use image::Rgb;
use serde::Deserialize;

use crate::config::QrConfig;
use crate::error::QrFileError;

/// 二维码渲染参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QrStyle {
    /// 深色模块颜色（CSS 颜色名或 `#rgb` / `#rrggbb`）
    pub fill_color: String,
    /// 背景颜色
    pub back_color: String,
    /// 每个模块的像素边长
    pub box_size: u32,
    /// 空白边框宽度（模块数）
    pub border: u32,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            fill_color: "red".to_string(),
            back_color: "white".to_string(),
            box_size: 10,
            border: 5,
        }
    }
}

impl From<&QrConfig> for QrStyle {
    fn from(cfg: &QrConfig) -> Self {
        Self {
            fill_color: cfg.fill_color.clone(),
            back_color: cfg.back_color.clone(),
            box_size: cfg.box_size,
            border: cfg.border,
        }
    }
}

/// 已校验、可直接用于渲染的参数
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedStyle {
    pub fill: Rgb<u8>,
    pub back: Rgb<u8>,
    pub box_size: u32,
    pub border: u32,
}

/// 单个模块边长上限，避免一次请求生成超大图片
pub const MAX_BOX_SIZE: u32 = 100;

impl QrStyle {
    pub(crate) fn resolve(&self) -> Result<ResolvedStyle, QrFileError> {
        let fill = parse_color(&self.fill_color)
            .ok_or_else(|| QrFileError::InvalidStyle(format!("fill_color: {}", self.fill_color)))?;
        let back = parse_color(&self.back_color)
            .ok_or_else(|| QrFileError::InvalidStyle(format!("back_color: {}", self.back_color)))?;
        if self.box_size == 0 || self.box_size > MAX_BOX_SIZE {
            return Err(QrFileError::InvalidStyle(format!(
                "size 必须在 1..={MAX_BOX_SIZE} 之间: {}",
                self.box_size
            )));
        }
        Ok(ResolvedStyle {
            fill,
            back,
            box_size: self.box_size,
            border: self.border,
        })
    }
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("aqua", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("fuchsia", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("purple", [128, 0, 128]),
    ("teal", [0, 128, 128]),
    ("navy", [0, 0, 128]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
];

/// 解析 CSS 颜色名或十六进制颜色
pub fn parse_color(raw: &str) -> Option<Rgb<u8>> {
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, rgb)| Rgb(*rgb))
}

fn parse_hex(hex: &str) -> Option<Rgb<u8>> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let d = c.to_digit(16)? as u8;
                out[i] = d * 17;
            }
            Some(Rgb(out))
        }
        6 => {
            let mut out = [0u8; 3];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            Some(Rgb(out))
        }
        _ => None,
    }
}
