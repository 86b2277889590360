//! Image preparation: bring a screenshot under a byte and dimension budget
//! before it is embedded in a request.
//!
//! The source file is never modified. Oversized images are downscaled and
//! re-encoded as JPEG into a scratch directory under a unique name.
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::config::ImageConfig;
use crate::errors::{BridgeError, BridgeResult};

const QUALITY_START: u8 = 85;
const QUALITY_FLOOR: u8 = 35;
const QUALITY_STEP: u8 = 10;
/// Halving rounds after the quality ladder is exhausted.
const MAX_SHRINK_ROUNDS: u32 = 4;

#[derive(Debug, Clone)]
pub struct ImagePreparer {
    max_bytes: u64,
    max_dimension: u32,
    scratch_dir: PathBuf,
}

impl ImagePreparer {
    pub fn new(max_bytes: u64, max_dimension: u32, scratch_dir: PathBuf) -> Self {
        Self {
            max_bytes,
            max_dimension: max_dimension.max(1),
            scratch_dir,
        }
    }

    pub fn from_config(cfg: &ImageConfig) -> Self {
        let scratch = cfg.scratch_dir.clone().unwrap_or_else(default_scratch_dir);
        Self::new(cfg.max_bytes, cfg.max_dimension, scratch)
    }

    /// Return a path to a file that satisfies the budget: `path` itself when it
    /// already does, otherwise a freshly written JPEG copy.
    pub fn prepare(&self, path: &Path) -> BridgeResult<PathBuf> {
        let size = std::fs::metadata(path)
            .map_err(|e| BridgeError::Image(format!("{}: {e}", path.display())))?
            .len();
        let (w, h) = image::image_dimensions(path)
            .map_err(|e| BridgeError::Image(format!("{}: {e}", path.display())))?;

        if size <= self.max_bytes && w.max(h) <= self.max_dimension {
            return Ok(path.to_path_buf());
        }

        let img = image::open(path)
            .map_err(|e| BridgeError::Image(format!("decode {}: {e}", path.display())))?;
        let bytes = self.shrink(img)?;

        std::fs::create_dir_all(&self.scratch_dir)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        let out = self
            .scratch_dir
            .join(format!("{stem}-{}.jpg", uuid::Uuid::new_v4().simple()));
        std::fs::write(&out, &bytes)?;

        tracing::debug!(
            src = %path.display(),
            dst = %out.display(),
            src_bytes = size,
            dst_bytes = bytes.len(),
            src_w = w,
            src_h = h,
            "image prepared"
        );
        Ok(out)
    }

    fn shrink(&self, img: DynamicImage) -> BridgeResult<Vec<u8>> {
        let mut current = if img.width().max(img.height()) > self.max_dimension {
            img.resize(
                self.max_dimension,
                self.max_dimension,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            img
        };

        let mut last = Vec::new();
        for round in 0..=MAX_SHRINK_ROUNDS {
            let mut quality = QUALITY_START;
            loop {
                last = encode_jpeg(&current, quality)?;
                if last.len() as u64 <= self.max_bytes {
                    return Ok(last);
                }
                if quality <= QUALITY_FLOOR {
                    break;
                }
                quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
            }
            if round < MAX_SHRINK_ROUNDS {
                let (w, h) = (current.width() / 2, current.height() / 2);
                if w == 0 || h == 0 {
                    break;
                }
                current = current.resize_exact(w, h, image::imageops::FilterType::Triangle);
            }
        }

        tracing::warn!(
            bytes = last.len(),
            budget = self.max_bytes,
            "image still over budget after shrinking, sending smallest encoding"
        );
        Ok(last)
    }
}

impl Default for ImagePreparer {
    fn default() -> Self {
        Self::from_config(&ImageConfig::default())
    }
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vlm-bridge")
        .join("prepared")
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> BridgeResult<Vec<u8>> {
    let mut buf = Vec::new();
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|e| BridgeError::Image(format!("JPEG encode: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_noise_png(path: &Path, w: u32, h: u32) {
        let mut state: u32 = 0x1234_5678;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        let mut img = image::RgbImage::new(w, h);
        for px in img.pixels_mut() {
            *px = image::Rgb([next(), next(), next()]);
        }
        img.save(path).unwrap();
    }

    #[test]
    fn compliant_image_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("small.png");
        write_noise_png(&src, 64, 48);

        let prep = ImagePreparer::new(10 * 1024 * 1024, 2048, dir.path().join("scratch"));
        let out = prep.prepare(&src).unwrap();
        assert_eq!(out, src);
        assert!(!dir.path().join("scratch").exists());
    }

    #[test]
    fn oversized_dimensions_are_downscaled_into_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wide.png");
        write_noise_png(&src, 400, 200);
        let before = std::fs::read(&src).unwrap();

        let scratch = dir.path().join("scratch");
        let prep = ImagePreparer::new(10 * 1024 * 1024, 100, scratch.clone());
        let out = prep.prepare(&src).unwrap();

        assert_ne!(out, src);
        assert!(out.starts_with(&scratch));
        let (w, h) = image::image_dimensions(&out).unwrap();
        assert_eq!((w, h), (100, 50));
        assert_eq!(std::fs::read(&src).unwrap(), before);
    }

    #[test]
    fn byte_budget_forces_recompression() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("noisy.png");
        write_noise_png(&src, 300, 300);
        let src_len = std::fs::metadata(&src).unwrap().len();

        let budget = 20 * 1024;
        assert!(src_len > budget);
        let prep = ImagePreparer::new(budget, 4096, dir.path().join("scratch"));
        let out = prep.prepare(&src).unwrap();
        assert!(std::fs::metadata(&out).unwrap().len() <= budget);
    }

    #[test]
    fn unreadable_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("not-an-image.png");
        std::fs::write(&src, b"plain text").unwrap();

        let prep = ImagePreparer::new(1024, 1024, dir.path().join("scratch"));
        assert!(matches!(prep.prepare(&src), Err(BridgeError::Image(_))));
        assert!(matches!(
            prep.prepare(&dir.path().join("missing.png")),
            Err(BridgeError::Image(_))
        ));
    }
}
