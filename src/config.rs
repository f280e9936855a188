use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_FRAME_STRIDE: u64 = 1;

#[derive(Debug, Deserialize, Default)]
struct AnalyzerConfigFile {
    confidence: Option<f32>,
    model: Option<ModelConfigFile>,
    labels: Option<LabelConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelConfigFile {
    font: Option<PathBuf>,
    classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    frame_stride: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub confidence: f32,
    pub model: ModelSettings,
    pub font_path: Option<PathBuf>,
    /// Class names indexed by class id.
    pub classes: Vec<String>,
    /// Every n-th annotated frame is written when a frame directory is set.
    pub frame_stride: u64,
}

/// Which detector to load and how.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Registered backend name; empty selects the registry default.
    pub backend: String,
    pub model_path: PathBuf,
    /// Square network input edge, in pixels.
    pub input_size: u32,
    pub iou_threshold: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            model: ModelSettings::default(),
            font_path: None,
            classes: Vec::new(),
            frame_stride: DEFAULT_FRAME_STRIDE,
        }
    }
}

impl AnalyzerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SURFACE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnalyzerConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let labels = file.labels.unwrap_or_default();
        Self {
            confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            model: ModelSettings {
                backend: model
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: model
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                iou_threshold: model.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            },
            font_path: labels.font,
            classes: labels.classes.unwrap_or_default(),
            frame_stride: file
                .output
                .and_then(|output| output.frame_stride)
                .unwrap_or(DEFAULT_FRAME_STRIDE),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("SURFACE_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("SURFACE_MODEL") {
            if !path.trim().is_empty() {
                self.model.model_path = PathBuf::from(path);
            }
        }
        if let Ok(confidence) = std::env::var("SURFACE_CONFIDENCE") {
            self.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SURFACE_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(font) = std::env::var("SURFACE_FONT") {
            if !font.trim().is_empty() {
                self.font_path = Some(PathBuf::from(font));
            }
        }
        if let Ok(classes) = std::env::var("SURFACE_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.classes = parsed;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_confidence(self.confidence)?;
        if self.model.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if !(self.model.iou_threshold > 0.0 && self.model.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "IoU threshold must be in (0, 1], got {}",
                self.model.iou_threshold
            ));
        }
        if self.frame_stride == 0 {
            return Err(anyhow!("frame stride must be greater than zero"));
        }
        Ok(())
    }
}

/// Reject thresholds outside `(0, 1]`.
pub fn validate_confidence(confidence: f32) -> Result<()> {
    if confidence > 0.0 && confidence <= 1.0 {
        Ok(())
    } else {
        Err(anyhow!(
            "confidence threshold must be in (0, 1], got {}",
            confidence
        ))
    }
}

fn read_config_file(path: &Path) -> Result<AnalyzerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bounds() {
        assert!(validate_confidence(0.05).is_ok());
        assert!(validate_confidence(1.0).is_ok());
        assert!(validate_confidence(0.0).is_err());
        assert!(validate_confidence(1.01).is_err());
        assert!(validate_confidence(f32::NAN).is_err());
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" crack, ,dent,"), vec!["crack", "dent"]);
    }

    #[test]
    fn file_values_override_defaults() {
        let file: AnalyzerConfigFile = toml::from_str(
            r#"
            confidence = 0.4

            [model]
            backend = "tract"
            path = "weights/surface.onnx"

            [labels]
            classes = ["crack", "dent"]
            "#,
        )
        .unwrap();
        let cfg = AnalyzerConfig::from_file(file);
        assert_eq!(cfg.confidence, 0.4);
        assert_eq!(cfg.model.backend, "tract");
        assert_eq!(cfg.model.model_path, PathBuf::from("weights/surface.onnx"));
        assert_eq!(cfg.model.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(cfg.classes, vec!["crack", "dent"]);
        assert_eq!(cfg.frame_stride, 1);
        assert!(cfg.validate().is_ok());
    }
}
