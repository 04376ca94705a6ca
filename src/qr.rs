//! Scannable-code generator – turns an identifier into a PNG QR code that
//! points at `<base uri>/<identifier>`, with the brand logo in the middle.
//!
//! The symbol is always encoded at error-correction level H (~30 %
//! redundancy) so the occluded centre does not break decoding. The logo is
//! scaled to at most [`CodeConfig::logo_fraction`] of the symbol edge, which
//! keeps it well clear of the finder and timing patterns.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Luma, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use url::Url;

use crate::data_uri;
use crate::error::{Error, Result};
use crate::model::ScannableId;
use crate::resources::{Resources, LOGO_RESOURCE};

/// Modules of quiet zone the `qrcode` renderer adds on every side.
const QUIET_ZONE_MODULES: u32 = 4;

/// Upper bound for [`CodeConfig::logo_fraction`]; beyond this the logo eats
/// into more than level H can recover.
pub const MAX_LOGO_FRACTION: f32 = 0.25;

/// Configuration for [`QrCodeGenerator`].
#[derive(Debug, Clone)]
pub struct CodeConfig {
    /// Origin the identifier is appended to (default: `https://zerobase.io/`).
    pub base_uri: String,
    /// Minimum edge of the rendered symbol in pixels (default: 400).
    pub size_px: u32,
    /// Largest logo edge as a fraction of the symbol edge (default: 0.2).
    pub logo_fraction: f32,
    /// Resource name of the logo (default: [`LOGO_RESOURCE`]).
    pub logo_resource: String,
    /// Keep the 4-module quiet zone around the symbol (default: true).
    pub quiet_zone: bool,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            base_uri: "https://zerobase.io/".to_string(),
            size_px: 400,
            logo_fraction: 0.2,
            logo_resource: LOGO_RESOURCE.to_string(),
            quiet_zone: true,
        }
    }
}

impl CodeConfig {
    /// Default config pointed at another origin.
    pub fn with_base_uri(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Self::default()
        }
    }
}

/// A composited QR code: PNG bytes plus the URI they encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
    uri: String,
}

impl QrImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The URI encoded in the symbol.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Self-contained `data:image/png;base64,…` reference for templates.
    pub fn to_data_uri(&self) -> String {
        data_uri::encode("image/png", &self.png)
    }
}

pub struct QrCodeGenerator {
    config: CodeConfig,
    base: Url,
    logo: DynamicImage,
}

impl QrCodeGenerator {
    /// Build a generator around an already decoded logo.
    pub fn new(mut config: CodeConfig, logo: DynamicImage) -> Result<Self> {
        let base = Url::parse(&config.base_uri)
            .map_err(|e| Error::Encoding(format!("invalid base URI {:?}: {e}", config.base_uri)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Encoding(format!(
                "base URI {:?} cannot carry path segments",
                config.base_uri
            )));
        }
        if config.size_px == 0 {
            return Err(Error::Encoding("symbol size must be positive".to_string()));
        }
        if config.logo_fraction.is_nan() || config.logo_fraction <= 0.0 {
            return Err(Error::Encoding(format!(
                "logo fraction must be positive, got {}",
                config.logo_fraction
            )));
        }
        config.logo_fraction = config.logo_fraction.min(MAX_LOGO_FRACTION);
        Ok(Self { config, base, logo })
    }

    /// Build a generator whose logo is looked up in `resources` under
    /// [`CodeConfig::logo_resource`]. The logo is read and decoded once, here.
    pub fn from_resources(config: CodeConfig, resources: &impl Resources) -> Result<Self> {
        let bytes = resources.resolve(&config.logo_resource)?;
        let logo = image::load_from_memory(&bytes).map_err(|e| Error::InvalidResource {
            name: config.logo_resource.clone(),
            reason: e.to_string(),
        })?;
        log::debug!(
            "loaded logo {} ({}x{})",
            config.logo_resource,
            logo.width(),
            logo.height()
        );
        Self::new(config, logo)
    }

    pub fn config(&self) -> &CodeConfig {
        &self.config
    }

    /// The URI a scan of `id` leads to: the identifier becomes exactly one
    /// percent-encoded path segment below the base URI.
    pub fn target_uri(&self, id: &ScannableId) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Encoding(format!("base URI {} cannot carry path segments", self.base)))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    /// Encode `identifier` and return the composited PNG.
    pub fn generate(&self, identifier: &str) -> Result<QrImage> {
        let id = ScannableId::new(identifier)?;
        let uri = self.target_uri(&id)?;
        log::debug!("encoding {uri}");

        let code = QrCode::with_error_correction_level(uri.as_str().as_bytes(), EcLevel::H)
            .map_err(|e| Error::Encoding(format!("{uri}: {e}")))?;

        let symbol = code
            .render::<Luma<u8>>()
            .min_dimensions(self.config.size_px, self.config.size_px)
            .quiet_zone(self.config.quiet_zone)
            .build();
        let mut canvas = DynamicImage::ImageLuma8(symbol).to_rgba8();

        let modules = code.width() as u32
            + if self.config.quiet_zone {
                2 * QUIET_ZONE_MODULES
            } else {
                0
            };
        let module_px = (canvas.width() / modules).max(1);
        self.overlay_logo(&mut canvas, module_px);

        let (width, height) = canvas.dimensions();
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| Error::Encoding(format!("PNG encoding failed: {e}")))?;
        log::trace!("{uri}: {width}x{height} px, {} bytes", png.len());

        Ok(QrImage {
            png,
            width,
            height,
            uri: uri.into(),
        })
    }

    /// Paint the logo, on a white pad one module wide, over the centre.
    fn overlay_logo(&self, canvas: &mut RgbaImage, module_px: u32) {
        let edge = canvas.width().min(canvas.height());
        let box_edge = (edge as f32 * self.config.logo_fraction).floor() as u32;
        let inner = box_edge.saturating_sub(2 * module_px);
        if inner == 0 {
            return;
        }

        let logo = self.logo.resize(inner, inner, FilterType::Lanczos3).to_rgba8();
        let pad_w = logo.width() + 2 * module_px;
        let pad_h = logo.height() + 2 * module_px;
        let mut pad = RgbaImage::from_pixel(pad_w, pad_h, Rgba([255, 255, 255, 255]));
        imageops::overlay(&mut pad, &logo, module_px as i64, module_px as i64);

        let x = (canvas.width() - pad_w) / 2;
        let y = (canvas.height() - pad_h) / 2;
        imageops::overlay(canvas, &pad, x as i64, y as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BundledResources, MemoryResources};

    fn generator() -> QrCodeGenerator {
        QrCodeGenerator::from_resources(CodeConfig::default(), &BundledResources).unwrap()
    }

    #[test]
    fn target_uri_appends_one_segment() {
        let gen = generator();
        let id = ScannableId::new("qr01").unwrap();
        assert_eq!(gen.target_uri(&id).unwrap().as_str(), "https://zerobase.io/qr01");
    }

    #[test]
    fn target_uri_escapes_reserved_characters() {
        let gen = generator();
        let id = ScannableId::new("a b/c?d#e").unwrap();
        assert_eq!(
            gen.target_uri(&id).unwrap().as_str(),
            "https://zerobase.io/a%20b%2Fc%3Fd%23e"
        );
    }

    #[test]
    fn target_uri_keeps_base_path() {
        let logo = DynamicImage::new_rgba8(8, 8);
        let gen =
            QrCodeGenerator::new(CodeConfig::with_base_uri("https://example.org/sites"), logo)
                .unwrap();
        let id = ScannableId::new("qr01").unwrap();
        assert_eq!(
            gen.target_uri(&id).unwrap().as_str(),
            "https://example.org/sites/qr01"
        );
    }

    #[test]
    fn rejects_unusable_base_uri() {
        let logo = DynamicImage::new_rgba8(8, 8);
        assert!(matches!(
            QrCodeGenerator::new(CodeConfig::with_base_uri("not a uri"), logo.clone()),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            QrCodeGenerator::new(CodeConfig::with_base_uri("mailto:someone@example.org"), logo),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn missing_logo_is_resource_not_found() {
        let err = QrCodeGenerator::from_resources(CodeConfig::default(), &MemoryResources::new())
            .err()
            .unwrap();
        assert!(matches!(err, Error::ResourceNotFound(name) if name == LOGO_RESOURCE));
    }

    #[test]
    fn undecodable_logo_is_invalid_resource() {
        let res = MemoryResources::new().with(LOGO_RESOURCE, b"not an image".to_vec());
        assert!(matches!(
            QrCodeGenerator::from_resources(CodeConfig::default(), &res),
            Err(Error::InvalidResource { .. })
        ));
    }

    #[test]
    fn generate_produces_square_png() {
        let img = generator().generate("qr01").unwrap();
        assert_eq!(&img.as_bytes()[1..4], b"PNG");
        assert_eq!(img.width(), img.height());
        assert!(img.width() >= 400);
        assert_eq!(img.uri(), "https://zerobase.io/qr01");
        assert!(img.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn logo_sits_in_the_centre() {
        let img = generator().generate("qr01").unwrap();
        let decoded = image::load_from_memory(img.as_bytes()).unwrap().to_rgba8();
        let (w, h) = decoded.dimensions();
        // The bundled logo is a dark blue disc; the symbol itself is greyscale.
        let (x0, y0) = (w / 2 - w / 20, h / 2 - h / 20);
        let blue = (x0..x0 + w / 10)
            .flat_map(|x| (y0..y0 + h / 10).map(move |y| (x, y)))
            .any(|(x, y)| {
                let p = decoded.get_pixel(x, y).0;
                p[2] as i32 > p[0] as i32 + 30
            });
        assert!(blue, "expected logo colours at the centre");
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn generate_rejects_invalid_identifiers() {
        let gen = generator();
        assert!(matches!(gen.generate(""), Err(Error::Encoding(_))));
        assert!(matches!(gen.generate(&"z".repeat(500)), Err(Error::Encoding(_))));
    }

    #[test]
    fn oversized_logo_fraction_is_clamped() {
        let mut config = CodeConfig::default();
        config.logo_fraction = 0.9;
        let gen = QrCodeGenerator::from_resources(config, &BundledResources).unwrap();
        assert!((gen.config().logo_fraction - MAX_LOGO_FRACTION).abs() < f32::EPSILON);
    }
}
