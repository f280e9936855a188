//! analyze_video - run a detector over a video and export a CSV report

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use surface_detector::analysis::{self, FrameSink, NullSink, PngSink};
use surface_detector::{
    export_csv, load_backend, AnalyzerConfig, ClassNames, FileConfig, FileSource,
    FrameProcessor, LabelFont, Session,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to analyse (or stub://<name> for a synthetic scene).
    video: String,
    /// Detector backend (cpu|stub|tract).
    #[arg(long)]
    backend: Option<String>,
    /// Model weights path.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Minimum confidence in (0, 1].
    #[arg(long)]
    confidence: Option<f32>,
    /// CSV report path.
    #[arg(long, default_value = "surface_report.csv")]
    report: PathBuf,
    /// Directory for annotated PNG frames.
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    /// Write every n-th annotated frame.
    #[arg(long)]
    stride: Option<u64>,
    /// TrueType font for labels.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Class names file, one name per line in class-id order.
    #[arg(long)]
    classes: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    limit: Option<u64>,
    /// Length of a synthetic stub:// video.
    #[arg(long, default_value_t = 100)]
    synthetic_frames: u64,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = AnalyzerConfig::load()?;
    if let Some(backend) = &args.backend {
        cfg.model.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.model.model_path = model.clone();
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence = confidence;
    }
    if let Some(stride) = args.stride {
        cfg.frame_stride = stride;
    }
    if let Some(font) = &args.font {
        cfg.font_path = Some(font.clone());
    }
    cfg.validate()?;

    let backend = {
        let _stage = ui.stage("Load model");
        load_backend(&cfg.model)?
    };
    let classes = match &args.classes {
        Some(path) => ClassNames::from_file(path)?,
        None => ClassNames::from_list(cfg.classes.iter().cloned()),
    };
    let mut processor = FrameProcessor::new(backend, classes);
    if let Some(path) = &cfg.font_path {
        processor = processor.with_font(LabelFont::load(path)?);
    }

    let mut source = FileSource::new(FileConfig {
        path: args.video.clone(),
        synthetic_frames: args.synthetic_frames,
    })?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut inner: Box<dyn FrameSink> = match &args.frames_dir {
        Some(dir) => Box::new(PngSink::new(dir, cfg.frame_stride)?),
        None => Box::new(NullSink),
    };

    let mut session = Session::new();
    let result = {
        let mut sink = ui::ProgressSink::new(inner.as_mut(), ui.frames("Analyse video"));
        analysis::run(
            &mut source,
            &mut processor,
            &mut session,
            &mut sink,
            cfg.confidence,
            &cancel,
            args.limit,
        )
    };
    // A mid-run failure still leaves the frames analysed so far in the
    // session; summarise and export them before reporting the error.
    let failure = match result {
        Ok(outcome) => {
            if outcome.aborted {
                log::warn!("analysis stopped early; the report covers the frames seen so far");
            }
            None
        }
        Err(err) => {
            log::error!("analysis failed: {:#}", err);
            Some(err)
        }
    };

    print_summary(&session, processor.classes());
    if session.aggregator().is_empty() {
        log::warn!("no detections recorded; nothing to save");
    } else {
        let _stage = ui.stage("Export report");
        export_csv(&args.report, session.aggregator(), processor.classes())
            .with_context(|| format!("export to {} failed", args.report.display()))?;
        eprintln!("Report written to {}", args.report.display());
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn print_summary(session: &Session, classes: &ClassNames) {
    let summary = session.aggregator().summarize();
    if summary.is_empty() {
        eprintln!("No objects detected.");
        return;
    }
    eprintln!("{:<6} {:<24} {:>10} {:>8}", "class", "name", "mean conf", "count");
    for (class_id, class_summary) in &summary {
        eprintln!(
            "{:<6} {:<24} {:>10.4} {:>8}",
            class_id,
            classes.name(*class_id),
            class_summary.average,
            class_summary.count
        );
    }
}
