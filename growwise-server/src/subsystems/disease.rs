//! Disease heuristic: color statistics over an uploaded leaf photo
//!
//! The upload is decoded, resized to a fixed square and reduced to the mean of
//! each RGB channel. The means are matched against a fixed, ordered set of
//! threshold bands; the first band that matches names the label. Confidence
//! starts at the band's base and grows with the distance past the threshold,
//! capped per band, so it always stays within [0, 100].
//!
//! There is no trained model here. The labels are coarse color symptoms.

use growwise_core::config::DiseaseConfig;
use growwise_core::error::{GrowError, Result};
use image::imageops::FilterType;
use image::RgbImage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseLabel {
    Healthy,
    BrownSpots,
    YellowLeaves,
    DarkPatches,
    WhitePatches,
}

impl DiseaseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseLabel::Healthy => "healthy",
            DiseaseLabel::BrownSpots => "brown_spots",
            DiseaseLabel::YellowLeaves => "yellow_leaves",
            DiseaseLabel::DarkPatches => "dark_patches",
            DiseaseLabel::WhitePatches => "white_patches",
        }
    }

    pub fn formatted_name(&self) -> &'static str {
        match self {
            DiseaseLabel::Healthy => "Plant Appears Healthy",
            DiseaseLabel::BrownSpots => "Possible Brown Spot Disease",
            DiseaseLabel::YellowLeaves => "Possible Yellowing/Chlorosis",
            DiseaseLabel::DarkPatches => "Possible Blight or Bacterial Infection",
            DiseaseLabel::WhitePatches => "Possible Powdery Mildew",
        }
    }

    pub fn treatment(&self) -> &'static str {
        match self {
            DiseaseLabel::Healthy => "Continue with regular care and monitoring. Maintain proper watering and fertilization.",
            DiseaseLabel::BrownSpots => "Apply copper-based fungicide spray. Remove affected leaves and improve air circulation.",
            DiseaseLabel::YellowLeaves => "Check for nutrient deficiency (nitrogen). Ensure proper watering and fertilization.",
            DiseaseLabel::DarkPatches => "Remove infected parts immediately. Apply bactericide and ensure good drainage.",
            DiseaseLabel::WhitePatches => "Improve air circulation. Apply fungicide spray and avoid overhead watering.",
        }
    }
}

/// Mean channel values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStats {
    pub mean_r: f64,
    pub mean_g: f64,
    pub mean_b: f64,
}

impl ColorStats {
    pub fn from_image(img: &RgbImage) -> Self {
        let count = (img.width() as f64) * (img.height() as f64);
        if count == 0.0 {
            return Self {
                mean_r: 0.0,
                mean_g: 0.0,
                mean_b: 0.0,
            };
        }

        let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
        for p in img.pixels() {
            r += p.0[0] as u64;
            g += p.0[1] as u64;
            b += p.0[2] as u64;
        }

        Self {
            mean_r: r as f64 / count,
            mean_g: g as f64 / count,
            mean_b: b as f64 / count,
        }
    }

    fn total(&self) -> f64 {
        self.mean_r + self.mean_g + self.mean_b
    }

    /// Green share of the total; 0 for a black image.
    pub fn green_ratio(&self) -> f64 {
        if self.total() == 0.0 {
            0.0
        } else {
            self.mean_g / self.total()
        }
    }

    pub fn red_ratio(&self) -> f64 {
        if self.total() == 0.0 {
            0.0
        } else {
            self.mean_r / self.total()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub disease: DiseaseLabel,
    pub formatted_name: &'static str,
    pub confidence: f64,
    pub treatment: &'static str,
}

impl Diagnosis {
    fn new(label: DiseaseLabel, confidence: f64) -> Self {
        Self {
            disease: label,
            formatted_name: label.formatted_name(),
            confidence: (confidence.clamp(0.0, 100.0) * 10.0).round() / 10.0,
            treatment: label.treatment(),
        }
    }
}

/// Base confidence plus `scale * margin`, capped.
fn band(base: f64, margin: f64, scale: f64, cap: f64) -> f64 {
    (base + margin.max(0.0) * scale).min(cap)
}

/// Map channel means to a label. Bands are checked in order; the first match wins.
pub fn classify(stats: &ColorStats) -> Diagnosis {
    let ColorStats {
        mean_r: r,
        mean_g: g,
        mean_b: b,
    } = *stats;
    let green_ratio = stats.green_ratio();
    let red_ratio = stats.red_ratio();

    if green_ratio > 0.4 && g > r && g > b {
        Diagnosis::new(DiseaseLabel::Healthy, band(75.0, green_ratio - 0.4, 100.0, 95.0))
    } else if red_ratio > 0.35 && r > g {
        Diagnosis::new(DiseaseLabel::BrownSpots, band(65.0, red_ratio - 0.35, 100.0, 90.0))
    } else if r > 150.0 && g > 150.0 && b < 100.0 {
        Diagnosis::new(DiseaseLabel::YellowLeaves, band(60.0, (100.0 - b) / 100.0, 20.0, 85.0))
    } else if r < 100.0 && g < 100.0 && b < 100.0 {
        let brightest = r.max(g).max(b);
        Diagnosis::new(DiseaseLabel::DarkPatches, band(55.0, (100.0 - brightest) / 100.0, 20.0, 80.0))
    } else if r > 200.0 && g > 200.0 && b > 200.0 {
        let dimmest = r.min(g).min(b);
        Diagnosis::new(DiseaseLabel::WhitePatches, band(50.0, (dimmest - 200.0) / 55.0, 20.0, 75.0))
    } else {
        // Nothing stands out.
        Diagnosis::new(DiseaseLabel::Healthy, 50.0)
    }
}

/// An uploaded file as received by the router.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

impl ImageUpload {
    /// Name stored with the prediction record.
    pub fn reference(&self) -> String {
        self.file_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct DiseaseDetector {
    image_size: u32,
    allowed_extensions: Vec<String>,
    max_upload_bytes: usize,
}

impl DiseaseDetector {
    pub fn new(config: &DiseaseConfig, max_upload_bytes: usize) -> Self {
        Self {
            image_size: config.image_size.max(1),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_upload_bytes,
        }
    }

    /// Shape checks that do not need decoding: size, extension, content type.
    pub fn check_upload(&self, upload: &ImageUpload) -> Result<()> {
        if upload.bytes.is_empty() {
            return Err(GrowError::validation("Uploaded file is empty"));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(GrowError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }

        let extension = upload
            .file_name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension {
            Some(ext) if self.allowed_extensions.iter().any(|a| *a == ext) => Ok(()),
            Some(_) => Err(GrowError::validation(format!(
                "Invalid file type. Allowed extensions: {}",
                self.allowed_extensions.join(", ")
            ))),
            None => match upload.content_type.as_deref() {
                Some(ct) if ct.starts_with("image/") => Ok(()),
                _ => Err(GrowError::validation("File must be an image")),
            },
        }
    }

    /// Decode, normalize and classify. Undecodable input is `InvalidImage`.
    pub fn analyze(&self, data: &[u8]) -> Result<Diagnosis> {
        let decoded = image::load_from_memory(data)
            .map_err(|e| GrowError::InvalidImage(format!("could not decode image: {}", e)))?;

        let normalized = decoded
            .resize_exact(self.image_size, self.image_size, FilterType::Triangle)
            .to_rgb8();

        let stats = ColorStats::from_image(&normalized);
        let diagnosis = classify(&stats);

        tracing::debug!(
            mean_r = stats.mean_r,
            mean_g = stats.mean_g,
            mean_b = stats.mean_b,
            disease = diagnosis.disease.as_str(),
            confidence = diagnosis.confidence,
            "Image classified"
        );

        Ok(diagnosis)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    /// Encode a uniform image of the given color.
    pub(crate) fn solid_image(rgb: [u8; 3], format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 24, Rgb(rgb));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, format)
            .expect("encode test image");
        buf.into_inner()
    }

    fn detector() -> DiseaseDetector {
        DiseaseDetector::new(&DiseaseConfig::default(), 1024 * 1024)
    }

    fn stats(r: f64, g: f64, b: f64) -> ColorStats {
        ColorStats {
            mean_r: r,
            mean_g: g,
            mean_b: b,
        }
    }

    #[test]
    fn test_green_leaf_is_healthy_with_high_confidence() {
        let d = detector()
            .analyze(&solid_image([40, 160, 40], ImageFormat::Png))
            .unwrap();
        assert_eq!(d.disease, DiseaseLabel::Healthy);
        assert_eq!(d.confidence, 95.0);
        assert_eq!(d.formatted_name, "Plant Appears Healthy");
    }

    #[test]
    fn test_bands_in_order() {
        assert_eq!(classify(&stats(150.0, 90.0, 60.0)).disease, DiseaseLabel::BrownSpots);
        assert_eq!(classify(&stats(200.0, 200.0, 50.0)).disease, DiseaseLabel::YellowLeaves);
        assert_eq!(classify(&stats(50.0, 50.0, 50.0)).disease, DiseaseLabel::DarkPatches);
        assert_eq!(classify(&stats(230.0, 230.0, 230.0)).disease, DiseaseLabel::WhitePatches);
        // Mid grey matches no band.
        let grey = classify(&stats(150.0, 150.0, 150.0));
        assert_eq!(grey.disease, DiseaseLabel::Healthy);
        assert_eq!(grey.confidence, 50.0);
    }

    #[test]
    fn test_confidence_grows_with_margin() {
        let weak = classify(&stats(120.0, 90.0, 80.0));
        let strong = classify(&stats(200.0, 60.0, 40.0));
        assert_eq!(weak.disease, DiseaseLabel::BrownSpots);
        assert_eq!(strong.disease, DiseaseLabel::BrownSpots);
        assert!(strong.confidence > weak.confidence);
    }

    #[test]
    fn test_black_image_is_dark_patches_without_nan() {
        let d = classify(&stats(0.0, 0.0, 0.0));
        assert_eq!(d.disease, DiseaseLabel::DarkPatches);
        assert!(d.confidence.is_finite());
        assert_eq!(d.confidence, 75.0);
    }

    #[test]
    fn test_confidence_always_in_range() {
        for r in (0..=255).step_by(15) {
            for g in (0..=255).step_by(15) {
                for b in (0..=255).step_by(15) {
                    let d = classify(&stats(r as f64, g as f64, b as f64));
                    assert!(
                        (0.0..=100.0).contains(&d.confidence),
                        "confidence {} out of range for ({}, {}, {})",
                        d.confidence,
                        r,
                        g,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_treatment_is_static_lookup() {
        let d = classify(&stats(230.0, 230.0, 230.0));
        assert_eq!(d.treatment, DiseaseLabel::WhitePatches.treatment());
    }

    #[test]
    fn test_undecodable_bytes_are_invalid_image() {
        let result = detector().analyze(b"definitely not an image");
        assert!(matches!(result, Err(GrowError::InvalidImage(_))));
    }

    #[test]
    fn test_truncated_png_is_invalid_image() {
        let mut png = solid_image([10, 200, 10], ImageFormat::Png);
        png.truncate(png.len() / 2);
        assert!(matches!(detector().analyze(&png), Err(GrowError::InvalidImage(_))));
    }

    #[test]
    fn test_jpeg_and_gif_decode() {
        for format in [ImageFormat::Jpeg, ImageFormat::Gif] {
            let d = detector().analyze(&solid_image([40, 160, 40], format)).unwrap();
            assert_eq!(d.disease, DiseaseLabel::Healthy, "format {:?}", format);
        }
    }

    fn upload(name: Option<&str>, ct: Option<&str>, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: name.map(str::to_string),
            content_type: ct.map(str::to_string),
            bytes: bytes::Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_check_upload_extension_allow_list() {
        let d = detector();
        assert!(d.check_upload(&upload(Some("leaf.PNG"), None, 10)).is_ok());
        assert!(d.check_upload(&upload(Some("leaf.jpeg"), None, 10)).is_ok());
        assert!(matches!(
            d.check_upload(&upload(Some("leaf.bmp"), Some("image/bmp"), 10)),
            Err(GrowError::Validation(_))
        ));
    }

    #[test]
    fn test_check_upload_falls_back_to_content_type() {
        let d = detector();
        assert!(d.check_upload(&upload(Some("leaf"), Some("image/png"), 10)).is_ok());
        assert!(d.check_upload(&upload(None, Some("text/plain"), 10)).is_err());
    }

    #[test]
    fn test_check_upload_size_limits() {
        let d = DiseaseDetector::new(&DiseaseConfig::default(), 100);
        assert!(matches!(
            d.check_upload(&upload(Some("a.png"), None, 0)),
            Err(GrowError::Validation(_))
        ));
        assert!(matches!(
            d.check_upload(&upload(Some("a.png"), None, 101)),
            Err(GrowError::PayloadTooLarge { limit: 100 })
        ));
    }
}
