//! Image decoding and CLIP pixel preprocessing.
//!
//! Mirrors the reference CLIP image processor:
//! - resize so the shortest edge equals `shortest_edge` (bicubic)
//! - center crop to `crop_width × crop_height`
//! - rescale to `[0, 1]`, then normalize per channel with `mean`/`std`
//! - NCHW layout `[1, 3, H, W]`
//!
//! Every image modality goes through [`decode_image`] and
//! [`PreprocessConfig::pixel_values`], so identical decoded pixels always
//! produce identical tensors.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageReader, Limits, imageops, imageops::FilterType};
use ndarray::Array4;
use serde::Deserialize;
use tracing::debug;

use crate::errors::EncodeError;

/// Default CLIP channel means (RGB).
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// Default CLIP channel standard deviations (RGB).
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];
/// Default CLIP input resolution.
pub const CLIP_INPUT_SIZE: u32 = 224;
/// Largest accepted width or height of a decoded image.
pub const MAX_IMAGE_SIDE: u32 = 16_384;
/// Upper bound on decoder allocations.
pub const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

/// Pixel preprocessing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub shortest_edge: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub rescale_factor: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            shortest_edge: CLIP_INPUT_SIZE,
            crop_width: CLIP_INPUT_SIZE,
            crop_height: CLIP_INPUT_SIZE,
            rescale_factor: 1.0 / 255.0,
            mean: CLIP_MEAN,
            std: CLIP_STD,
        }
    }
}

/// `size` / `crop_size` as they appear in `preprocessor_config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SizeSpec {
    Square(u32),
    ShortestEdge { shortest_edge: u32 },
    HeightWidth { height: u32, width: u32 },
}

#[derive(Debug, Deserialize)]
struct RawPreprocessorConfig {
    size: Option<SizeSpec>,
    crop_size: Option<SizeSpec>,
    rescale_factor: Option<f32>,
    image_mean: Option<Vec<f32>>,
    image_std: Option<Vec<f32>>,
}

impl PreprocessConfig {
    /// Parses a `preprocessor_config.json` document; absent keys keep CLIP defaults.
    pub fn from_json_str(s: &str) -> Result<Self, EncodeError> {
        let raw: RawPreprocessorConfig = serde_json::from_str(s)
            .map_err(|e| EncodeError::ModelLoad(format!("preprocessor config: {e}")))?;

        let mut cfg = Self::default();

        if let Some(size) = raw.size {
            cfg.shortest_edge = match size {
                SizeSpec::Square(n) => n,
                SizeSpec::ShortestEdge { shortest_edge } => shortest_edge,
                SizeSpec::HeightWidth { height, width } => height.min(width),
            };
        }
        match raw.crop_size {
            Some(SizeSpec::Square(n)) | Some(SizeSpec::ShortestEdge { shortest_edge: n }) => {
                cfg.crop_width = n;
                cfg.crop_height = n;
            }
            Some(SizeSpec::HeightWidth { height, width }) => {
                cfg.crop_width = width;
                cfg.crop_height = height;
            }
            None => {
                cfg.crop_width = cfg.shortest_edge;
                cfg.crop_height = cfg.shortest_edge;
            }
        }
        if let Some(f) = raw.rescale_factor {
            cfg.rescale_factor = f;
        }
        if let Some(mean) = raw.image_mean {
            cfg.mean = triple("image_mean", &mean)?;
        }
        if let Some(std) = raw.image_std {
            cfg.std = triple("image_std", &std)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads the config from a file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, EncodeError> {
        if !path.exists() {
            debug!(path = %path.display(), "preprocessor config not found, using CLIP defaults");
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| EncodeError::ModelLoad(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    fn validate(&self) -> Result<(), EncodeError> {
        if self.shortest_edge == 0 || self.crop_width == 0 || self.crop_height == 0 {
            return Err(EncodeError::ModelLoad(
                "preprocessor sizes must be > 0".into(),
            ));
        }
        if self.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(EncodeError::ModelLoad(
                "preprocessor image_std must be finite and non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Converts a decoded image into the `[1, 3, H, W]` tensor the vision tower expects.
    ///
    /// The crop window is located in source coordinates and only that region
    /// is resized, so memory stays bounded by the crop size for any aspect ratio.
    pub fn pixel_values(&self, image: &DynamicImage) -> Array4<f32> {
        let mut out = Array4::<f32>::zeros((
            1,
            3,
            self.crop_height as usize,
            self.crop_width as usize,
        ));
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        if w == 0 || h == 0 {
            return out;
        }
        let (resized_w, resized_h) = self.resized_dimensions(w, h);
        let xs = CropSpan::new(w, resized_w, self.crop_width);
        let ys = CropSpan::new(h, resized_h, self.crop_height);

        let region = imageops::crop_imm(&rgb, xs.src_start, ys.src_start, xs.src_len, ys.src_len)
            .to_image();
        let scaled = if region.dimensions() == (xs.out_len, ys.out_len) {
            region
        } else {
            imageops::resize(&region, xs.out_len, ys.out_len, FilterType::CatmullRom)
        };

        // Cells outside the scaled region stay zero when the image is smaller than the crop.
        for (x, y, px) in scaled.enumerate_pixels() {
            let ox = (xs.out_start + x) as usize;
            let oy = (ys.out_start + y) as usize;
            for c in 0..3 {
                let v = px.0[c] as f32 * self.rescale_factor;
                out[[0, c, oy, ox]] = (v - self.mean[c]) / self.std[c];
            }
        }
        out
    }

    /// Size the image would have after scaling its shortest edge to `shortest_edge`.
    fn resized_dimensions(&self, w: u32, h: u32) -> (u64, u64) {
        let target = self.shortest_edge as u64;
        if w <= h {
            (target, (target * h as u64 / w.max(1) as u64).max(1))
        } else {
            ((target * w as u64 / h.max(1) as u64).max(1), target)
        }
    }
}

/// One axis of the center crop, expressed both in source pixels and in
/// output cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropSpan {
    src_start: u32,
    src_len: u32,
    out_start: u32,
    out_len: u32,
}

impl CropSpan {
    /// `src`: source length, `resized`: length after the shortest-edge resize,
    /// `crop`: output length.
    fn new(src: u32, resized: u64, crop: u32) -> Self {
        let crop = crop as i64;
        let offset = (resized as i64 - crop) / 2;
        let lo = offset.max(0) as u64;
        let hi = (offset + crop).min(resized as i64) as u64;

        let src_start = (lo * src as u64 / resized) as u32;
        let src_end = ((hi * src as u64).div_ceil(resized) as u32).clamp(src_start + 1, src);

        Self {
            src_start,
            src_len: src_end - src_start,
            out_start: (-offset).max(0) as u32,
            out_len: (hi - lo) as u32,
        }
    }
}

/// Decodes raw bytes as a supported raster image.
///
/// Dimensions are capped at [`MAX_IMAGE_SIDE`] and decoder allocations at
/// [`MAX_DECODE_ALLOC`].
///
/// # Errors
/// Returns [`EncodeError::InvalidInput`] when the bytes are empty, not an
/// image, or over the decode limits.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EncodeError> {
    if bytes.is_empty() {
        return Err(EncodeError::InvalidInput("image payload is empty".into()));
    }
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EncodeError::InvalidInput(format!("cannot read image: {e}")))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    reader.limits(limits);

    reader
        .decode()
        .map_err(|e| EncodeError::InvalidInput(format!("cannot decode image: {e}")))
}

fn triple(name: &str, v: &[f32]) -> Result<[f32; 3], EncodeError> {
    match v {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(EncodeError::ModelLoad(format!(
            "{name} must have 3 values, got {}",
            v.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn solid_png(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb(rgb));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn parses_hf_style_config() {
        let json = r#"{
            "crop_size": {"height": 224, "width": 224},
            "size": {"shortest_edge": 224},
            "do_normalize": true,
            "image_mean": [0.5, 0.5, 0.5],
            "image_std": [0.25, 0.25, 0.25],
            "rescale_factor": 0.00392156862745098
        }"#;
        let cfg = PreprocessConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.shortest_edge, 224);
        assert_eq!((cfg.crop_width, cfg.crop_height), (224, 224));
        assert_eq!(cfg.mean, [0.5, 0.5, 0.5]);
        assert_eq!(cfg.std, [0.25, 0.25, 0.25]);
    }

    #[test]
    fn parses_legacy_integer_sizes() {
        let cfg = PreprocessConfig::from_json_str(r#"{"size": 256, "crop_size": 256}"#).unwrap();
        assert_eq!(cfg.shortest_edge, 256);
        assert_eq!((cfg.crop_width, cfg.crop_height), (256, 256));
        assert_eq!(cfg.mean, CLIP_MEAN);
    }

    #[test]
    fn rejects_bad_mean_arity() {
        let err = PreprocessConfig::from_json_str(r#"{"image_mean": [0.1, 0.2]}"#).unwrap_err();
        assert!(matches!(err, EncodeError::ModelLoad(_)));
    }

    #[test]
    fn pixel_values_have_nchw_crop_shape() {
        let cfg = PreprocessConfig::default();
        let img = decode_image(&solid_png(400, 225, [10, 20, 30])).unwrap();
        let t = cfg.pixel_values(&img);
        assert_eq!(t.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn white_pixels_normalize_with_clip_stats() {
        let cfg = PreprocessConfig::default();
        let img = decode_image(&solid_png(224, 224, [255, 255, 255])).unwrap();
        let t = cfg.pixel_values(&img);
        for c in 0..3 {
            let want = (1.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            let got = t[[0, c, 100, 100]];
            assert!((got - want).abs() < 1e-4, "channel {c}: {got} vs {want}");
        }
    }

    #[test]
    fn same_bytes_give_identical_tensors() {
        let cfg = PreprocessConfig::default();
        let bytes = solid_png(320, 180, [200, 100, 50]);
        let a = cfg.pixel_values(&decode_image(&bytes).unwrap());
        let b = cfg.pixel_values(&decode_image(&bytes).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn decode_rejects_garbage_and_empty() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(EncodeError::InvalidInput(_))
        ));
        assert!(matches!(decode_image(&[]), Err(EncodeError::InvalidInput(_))));
    }

    #[test]
    fn extreme_aspect_ratio_stays_within_crop() {
        let cfg = PreprocessConfig::default();
        let tall = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 40_000, Rgb([255, 255, 255])));
        let t = cfg.pixel_values(&tall);
        assert_eq!(t.shape(), &[1, 3, 224, 224]);
        let white = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        assert!((t[[0, 0, 112, 112]] - white).abs() < 1e-3);

        let wide = DynamicImage::ImageRgb8(RgbImage::from_pixel(40_000, 1, Rgb([0, 0, 0])));
        assert_eq!(cfg.pixel_values(&wide).shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn tall_png_within_limits_encodes() {
        let cfg = PreprocessConfig::default();
        let img = decode_image(&solid_png(1, 16_000, [10, 20, 30])).unwrap();
        assert_eq!(cfg.pixel_values(&img).shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn oversized_png_is_invalid_input() {
        let err = decode_image(&solid_png(1, 40_000, [10, 20, 30])).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn small_image_is_centered_and_padded() {
        let cfg = PreprocessConfig {
            shortest_edge: 4,
            crop_width: 6,
            crop_height: 4,
            ..PreprocessConfig::default()
        };
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let t = cfg.pixel_values(&img);
        assert_eq!(t.shape(), &[1, 3, 4, 6]);
        assert_eq!(t[[0, 0, 0, 0]], 0.0);
        assert_eq!(t[[0, 0, 0, 5]], 0.0);
        assert!(t[[0, 0, 0, 1]] > 0.0);
    }

    #[test]
    fn crop_span_maps_back_to_source() {
        // 400 px scaled to 398, center 224 window.
        let s = CropSpan::new(400, 398, 224);
        assert_eq!((s.out_start, s.out_len), (0, 224));
        assert_eq!(s.src_start, 87);
        assert!(s.src_start + s.src_len <= 400);

        // Already at target size: identity.
        let s = CropSpan::new(224, 224, 224);
        assert_eq!(s, CropSpan { src_start: 0, src_len: 224, out_start: 0, out_len: 224 });
    }
}
