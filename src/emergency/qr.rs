//! QR rendering of timeline links.
//!
//! Module layout comes from the `qrcode` crate; rasterisation (scale, quiet
//! margin, colours) is done here so the margin can be any number of modules.

use base64::Engine as _;
use qrcode::types::QrError as CodeError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    #[error("Text of {len} bytes does not fit in a QR code at error correction {level:?}")]
    EncodingCapacityExceeded { len: usize, level: ErrorCorrection },

    #[error("Invalid colour: {0}")]
    InvalidColor(String),

    #[error("QR generation failed: {0}")]
    Encoding(String),

    #[error("Image encoding failed: {0}")]
    Image(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Svg,
}

/// Largest accepted target width. Bounds the PNG raster allocation.
pub const MAX_WIDTH_PX: u32 = 4096;
/// Largest accepted quiet zone, in modules.
pub const MAX_MARGIN_MODULES: u32 = 64;

/// Rendering options for one QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrOptions {
    /// Target edge length in pixels. The module scale is the largest whole
    /// number that fits, never below one pixel per module.
    pub width_px: u32,
    /// Quiet zone on each side, in modules.
    pub margin_modules: u32,
    /// `#RRGGBB` or `#RGB`.
    pub dark: String,
    pub light: String,
    pub error_correction: ErrorCorrection,
}

impl QrOptions {
    /// Reject geometry the raster cannot be built from.
    pub fn check_bounds(&self) -> Result<(), QrError> {
        if self.width_px == 0 || self.width_px > MAX_WIDTH_PX {
            return Err(QrError::Encoding(format!(
                "width {} px outside 1..={MAX_WIDTH_PX}",
                self.width_px
            )));
        }
        if self.margin_modules > MAX_MARGIN_MODULES {
            return Err(QrError::Encoding(format!(
                "margin {} modules above {MAX_MARGIN_MODULES}",
                self.margin_modules
            )));
        }
        Ok(())
    }
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            width_px: 240,
            margin_modules: 1,
            dark: "#000000".into(),
            light: "#FFFFFF".into(),
            error_correction: ErrorCorrection::Medium,
        }
    }
}

/// Swappable QR primitive.
pub trait QrRenderer: Send + Sync {
    fn encode(&self, text: &str, options: &QrOptions) -> Result<QrImage, QrError>;
}

/// Default renderer backed by the `qrcode` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeRenderer;

impl QrRenderer for QrCodeRenderer {
    fn encode(&self, text: &str, options: &QrOptions) -> Result<QrImage, QrError> {
        options.check_bounds()?;
        let dark = parse_hex_color(&options.dark)?;
        let light = parse_hex_color(&options.light)?;

        let code = QrCode::with_error_correction_level(text.as_bytes(), options.error_correction.into())
            .map_err(|e| match e {
                CodeError::DataTooLong => QrError::EncodingCapacityExceeded {
                    len: text.len(),
                    level: options.error_correction,
                },
                other => QrError::Encoding(other.to_string()),
            })?;

        let modules = code.width() as u32;
        let cells = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();

        let margin = options.margin_modules;
        let span = margin
            .checked_mul(2)
            .and_then(|m| m.checked_add(modules))
            .ok_or_else(|| QrError::Encoding("QR geometry overflows".into()))?;
        let scale = (options.width_px / span).max(1);

        tracing::debug!(
            payload_len = text.len(),
            modules,
            scale,
            "QR code encoded"
        );

        Ok(QrImage {
            modules,
            margin,
            scale,
            cells,
            dark,
            light,
        })
    }
}

/// A rendered QR code: the module grid plus the raster geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    modules: u32,
    margin: u32,
    scale: u32,
    cells: Vec<bool>,
    dark: [u8; 3],
    light: [u8; 3],
}

impl QrImage {
    /// Modules per side, without the quiet zone.
    pub fn modules(&self) -> u32 {
        self.modules
    }

    /// Pixels per module.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Edge length of the raster in pixels, quiet zone included.
    pub fn size_px(&self) -> u32 {
        // Bounded by `QrOptions::check_bounds` at construction.
        (self.modules + 2 * self.margin).saturating_mul(self.scale)
    }

    pub fn is_dark_module(&self, x: u32, y: u32) -> bool {
        x < self.modules && y < self.modules && self.cells[(y * self.modules + x) as usize]
    }

    pub fn is_dark_pixel(&self, px: u32, py: u32) -> bool {
        let mx = (px / self.scale).checked_sub(self.margin);
        let my = (py / self.scale).checked_sub(self.margin);
        match (mx, my) {
            (Some(x), Some(y)) => self.is_dark_module(x, y),
            _ => false,
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>, QrError> {
        let size = self.size_px();
        let raster = image::RgbImage::from_fn(size, size, |x, y| {
            if self.is_dark_pixel(x, y) {
                image::Rgb(self.dark)
            } else {
                image::Rgb(self.light)
            }
        });

        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(raster)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .map_err(|e| QrError::Image(e.to_string()))?;
        Ok(bytes)
    }

    pub fn to_svg(&self) -> String {
        let size = self.size_px();
        let mut path = String::new();
        for y in 0..self.modules {
            for x in 0..self.modules {
                if self.is_dark_module(x, y) {
                    let px = (x + self.margin) * self.scale;
                    let py = (y + self.margin) * self.scale;
                    path.push_str(&format!("M{px} {py}h{s}v{s}h-{s}z", s = self.scale));
                }
            }
        }
        format!(
            "<?xml version=\"1.0\" standalone=\"yes\"?>\
             <svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{size}\" height=\"{size}\" \
             viewBox=\"0 0 {size} {size}\" shape-rendering=\"crispEdges\">\
             <rect width=\"100%\" height=\"100%\" fill=\"{light}\"/>\
             <path fill=\"{dark}\" d=\"{path}\"/></svg>",
            light = hex(self.light),
            dark = hex(self.dark),
        )
    }

    /// Inline `data:` URI, embeddable in an `<img src>`.
    pub fn to_data_uri(&self, format: ImageFormat) -> Result<String, QrError> {
        let engine = base64::engine::general_purpose::STANDARD;
        Ok(match format {
            ImageFormat::Png => format!("data:image/png;base64,{}", engine.encode(self.to_png()?)),
            ImageFormat::Svg => format!(
                "data:image/svg+xml;base64,{}",
                engine.encode(self.to_svg().as_bytes())
            ),
        })
    }
}

fn parse_hex_color(value: &str) -> Result<[u8; 3], QrError> {
    let invalid = || QrError::InvalidColor(value.to_string());
    let digits = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match digits.len() {
        6 => Ok([channel(&digits[0..2])?, channel(&digits[2..4])?, channel(&digits[4..6])?]),
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = channel(&c.to_string())?;
                rgb[i] = v * 17;
            }
            Ok(rgb)
        }
        _ => Err(invalid()),
    }
}

fn hex(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(image: &QrImage) -> Vec<String> {
        let size = image.size_px() as usize;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(size, size, |x, y| {
            if image.is_dark_pixel(x as u32, y as u32) {
                0
            } else {
                255
            }
        });
        prepared
            .detect_grids()
            .into_iter()
            .map(|grid| grid.decode().expect("decode grid").1)
            .collect()
    }

    fn scannable_options() -> QrOptions {
        QrOptions {
            width_px: 400,
            margin_modules: 4,
            ..QrOptions::default()
        }
    }

    #[test]
    fn scanned_code_reproduces_url() {
        let url = "https://care.example.org/member/m1?tab=timeline&pmh=QXN0aG1hIHNpbmNlIDIwMTA%3D";
        let image = QrCodeRenderer.encode(url, &scannable_options()).unwrap();
        assert_eq!(scan(&image), vec![url.to_string()]);
    }

    #[test]
    fn scanned_long_url_is_not_truncated() {
        let history = "Type 2 diabetes since 2012, hypertension, stent in LAD 2021. ".repeat(4);
        let url = crate::emergency::link::build_timeline_link(
            "https://care.example.org",
            &crate::models::MemberId::new("3f2b8c1e-9a4d-4e6f-8b1a-2c3d4e5f6a7b").unwrap(),
            Some(&history),
        );
        let image = QrCodeRenderer
            .encode(&url, &QrOptions { width_px: 800, ..scannable_options() })
            .unwrap();
        assert_eq!(scan(&image), vec![url]);
    }

    #[test]
    fn capacity_exceeded_is_reported() {
        let text = "x".repeat(3000);
        let err = QrCodeRenderer.encode(&text, &QrOptions::default()).unwrap_err();
        assert_eq!(
            err,
            QrError::EncodingCapacityExceeded {
                len: 3000,
                level: ErrorCorrection::Medium
            }
        );
    }

    #[test]
    fn higher_error_correction_lowers_capacity() {
        let text = "x".repeat(1500);
        assert!(QrCodeRenderer
            .encode(&text, &QrOptions { error_correction: ErrorCorrection::Low, ..QrOptions::default() })
            .is_ok());
        assert!(matches!(
            QrCodeRenderer.encode(&text, &QrOptions { error_correction: ErrorCorrection::High, ..QrOptions::default() }),
            Err(QrError::EncodingCapacityExceeded { .. })
        ));
    }

    #[test]
    fn default_geometry_fits_target_width() {
        let image = QrCodeRenderer
            .encode("https://care.example.org/member/m1?tab=timeline", &QrOptions::default())
            .unwrap();
        assert!(image.size_px() <= 240);
        assert!(image.scale() >= 1);
        // Quiet zone of one module stays light
        for p in 0..image.scale() {
            assert!(!image.is_dark_pixel(p, p));
        }
        // Top-left finder pattern corner is dark right after the margin
        assert!(image.is_dark_pixel(image.scale(), image.scale()));
    }

    #[test]
    fn tiny_width_still_renders_one_pixel_per_module() {
        let image = QrCodeRenderer
            .encode("hi", &QrOptions { width_px: 1, ..QrOptions::default() })
            .unwrap();
        assert_eq!(image.scale(), 1);
        assert_eq!(image.size_px(), image.modules() + 2);
    }

    #[test]
    fn oversized_margin_is_rejected_not_overflowed() {
        let options = QrOptions {
            margin_modules: 3_000_000_000,
            ..QrOptions::default()
        };
        assert!(matches!(
            QrCodeRenderer.encode("hello", &options),
            Err(QrError::Encoding(_))
        ));
    }

    #[test]
    fn oversized_or_zero_width_is_rejected() {
        for width_px in [0, MAX_WIDTH_PX + 1, 100_000] {
            let options = QrOptions { width_px, ..QrOptions::default() };
            assert!(
                matches!(QrCodeRenderer.encode("hello", &options), Err(QrError::Encoding(_))),
                "{width_px} should be rejected"
            );
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let options = QrOptions {
            width_px: MAX_WIDTH_PX,
            margin_modules: MAX_MARGIN_MODULES,
            ..QrOptions::default()
        };
        let image = QrCodeRenderer.encode("hello", &options).unwrap();
        assert!(image.size_px() <= MAX_WIDTH_PX);
    }

    #[test]
    fn png_has_signature() {
        let image = QrCodeRenderer.encode("hello", &QrOptions::default()).unwrap();
        let png = image.to_png().unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn data_uris() {
        let image = QrCodeRenderer.encode("hello", &QrOptions::default()).unwrap();
        assert!(image
            .to_data_uri(ImageFormat::Png)
            .unwrap()
            .starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert!(image
            .to_data_uri(ImageFormat::Svg)
            .unwrap()
            .starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn svg_uses_colours() {
        let options = QrOptions {
            dark: "#1C1917".into(),
            light: "#fff".into(),
            ..QrOptions::default()
        };
        let svg = QrCodeRenderer.encode("hello", &options).unwrap().to_svg();
        assert!(svg.contains("fill=\"#1c1917\""));
        assert!(svg.contains("fill=\"#ffffff\""));
    }

    #[test]
    fn invalid_colours_rejected() {
        for bad in ["000000", "#12345", "#GGGGGG", "red", ""] {
            let options = QrOptions { dark: bad.into(), ..QrOptions::default() };
            assert!(
                matches!(QrCodeRenderer.encode("x", &options), Err(QrError::InvalidColor(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn renderer_is_object_safe() {
        fn _assert(_: &dyn QrRenderer) {}
        _assert(&QrCodeRenderer);
    }
}
