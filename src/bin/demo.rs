//! demo - end-to-end synthetic run for the surface detector

use anyhow::{anyhow, Result};
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use surface_detector::analysis::{self, PngSink};
use surface_detector::{
    export_csv, load_backend, ClassNames, FileConfig, FileSource, FrameProcessor, LabelFont,
    ModelSettings, Session,
};

#[path = "../ui.rs"]
mod ui;

const DEMO_CLASSES: [&str; 3] = ["red patch", "green patch", "blue patch"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames.
    #[arg(long, default_value_t = 60)]
    frames: u64,
    /// Write every n-th annotated frame.
    #[arg(long, default_value_t = 10)]
    stride: u64,
    /// Minimum confidence in (0, 1].
    #[arg(long, default_value_t = 0.25)]
    confidence: f32,
    /// Output directory for frames and the report.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// TrueType font for labels.
    #[arg(long, env = "SURFACE_FONT")]
    font: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let out_dir = PathBuf::from(&args.out);
    fs::create_dir_all(&out_dir)?;

    let backend = {
        let _stage = ui.stage("Load cpu detector");
        load_backend(&ModelSettings::default())?
    };
    let mut processor = FrameProcessor::new(backend, ClassNames::from_list(DEMO_CLASSES));
    if let Some(path) = &args.font {
        processor = processor.with_font(LabelFont::load(path)?);
    }

    let mut source = FileSource::new(FileConfig {
        path: "stub://demo".to_string(),
        synthetic_frames: args.frames,
    })?;
    let mut sink = PngSink::new(&out_dir.join("frames"), args.stride)?;
    let cancel = AtomicBool::new(false);
    let mut session = Session::new();

    let outcome = {
        let mut progress = ui::ProgressSink::new(&mut sink, ui.frames("Analyse synthetic video"));
        analysis::run(
            &mut source,
            &mut processor,
            &mut session,
            &mut progress,
            args.confidence,
            &cancel,
            None,
        )?
    };

    let report_path = out_dir.join("demo_report.csv");
    {
        let _stage = ui.stage("Export report");
        export_csv(&report_path, session.aggregator(), processor.classes())?;
    }

    println!("Demo complete.");
    println!("  frames analysed: {}", outcome.frames);
    println!("  detections: {}", outcome.detections);
    for (class_id, summary) in session.aggregator().summarize() {
        println!(
            "  {}: mean confidence {:.4} over {} detections",
            processor.classes().name(class_id),
            summary.average,
            summary.count
        );
    }
    println!("  frames: {}", out_dir.join("frames").display());
    println!("  report: {}", report_path.display());
    Ok(())
}
