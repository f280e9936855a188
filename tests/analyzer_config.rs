use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use surface_detector::config::AnalyzerConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SURFACE_CONFIG",
        "SURFACE_BACKEND",
        "SURFACE_MODEL",
        "SURFACE_CONFIDENCE",
        "SURFACE_FONT",
        "SURFACE_CLASSES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AnalyzerConfig::load().expect("load config");
    assert_eq!(cfg.model.backend, "cpu");
    assert_eq!(cfg.model.model_path, PathBuf::from("best.onnx"));
    assert_eq!(cfg.model.input_size, 640);
    assert!((cfg.model.iou_threshold - 0.45).abs() < f32::EPSILON);
    assert!((cfg.confidence - 0.25).abs() < f32::EPSILON);
    assert!(cfg.font_path.is_none());
    assert!(cfg.classes.is_empty());
    assert_eq!(cfg.frame_stride, 1);
}

#[test]
fn loads_toml_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        confidence = 0.4

        [model]
        backend = "stub"
        path = "weights/plate.onnx"
        input_size = 320
        iou_threshold = 0.5

        [labels]
        font = "/usr/share/fonts/DejaVuSans.ttf"
        classes = ["scratch", "crack"]

        [output]
        frame_stride = 5
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("SURFACE_CONFIG", file.path());
    std::env::set_var("SURFACE_MODEL", "weights/override.onnx");
    std::env::set_var("SURFACE_CLASSES", "pit, dent ,corrosion");

    let cfg = AnalyzerConfig::load().expect("load config");

    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.model.model_path, PathBuf::from("weights/override.onnx"));
    assert_eq!(cfg.model.input_size, 320);
    assert!((cfg.confidence - 0.4).abs() < f32::EPSILON);
    assert_eq!(
        cfg.font_path,
        Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf"))
    );
    assert_eq!(cfg.classes, vec!["pit", "dent", "corrosion"]);
    assert_eq!(cfg.frame_stride, 5);

    clear_env();
}

#[test]
fn loads_json_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp config");
    let json = r#"{ "confidence": 0.6, "model": { "backend": "stub" } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("SURFACE_CONFIG", file.path());

    let cfg = AnalyzerConfig::load().expect("load config");
    assert_eq!(cfg.model.backend, "stub");
    assert!((cfg.confidence - 0.6).abs() < f32::EPSILON);

    clear_env();
}

#[test]
fn rejects_out_of_range_confidence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SURFACE_CONFIDENCE", "1.5");
    let err = AnalyzerConfig::load().unwrap_err();
    assert!(err.to_string().contains("(0, 1]"));

    std::env::set_var("SURFACE_CONFIDENCE", "high");
    assert!(AnalyzerConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"confidence = [").expect("write config");
    std::env::set_var("SURFACE_CONFIG", file.path());

    let err = AnalyzerConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
