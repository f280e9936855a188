use anyhow::Result;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use surface_detector::analysis::{FrameSink, SinkControl};

const PLAIN_PROGRESS_EVERY: u64 = 100;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live frame counter for the analysis loop.
    pub fn frames(&self, name: &str) -> FrameCounter {
        let spinner = if self.use_pretty() {
            let spinner = spinner("{spinner} {msg} {pos} frames");
            spinner.set_message(name.to_string());
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        FrameCounter {
            name: name.to_string(),
            start: Instant::now(),
            frames: 0,
            spinner,
        }
    }
}

fn spinner(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct FrameCounter {
    name: String,
    start: Instant,
    frames: u64,
    spinner: Option<ProgressBar>,
}

impl FrameCounter {
    pub fn tick(&mut self) {
        self.frames += 1;
        match &self.spinner {
            Some(spinner) => spinner.set_position(self.frames),
            None if self.frames % PLAIN_PROGRESS_EVERY == 0 => {
                eprintln!("    {} frames", self.frames);
            }
            None => {}
        }
    }
}

/// Forwards frames to `inner` and ticks the counter for each one shown.
pub struct ProgressSink<'a> {
    inner: &'a mut dyn FrameSink,
    counter: FrameCounter,
}

impl<'a> ProgressSink<'a> {
    pub fn new(inner: &'a mut dyn FrameSink, counter: FrameCounter) -> Self {
        Self { inner, counter }
    }
}

impl FrameSink for ProgressSink<'_> {
    fn show(&mut self, frame_index: u64, image: &RgbImage) -> Result<SinkControl> {
        let control = self.inner.show(frame_index, image)?;
        self.counter.tick();
        Ok(control)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl Drop for FrameCounter {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let fps = self.frames as f64 / elapsed.as_secs_f64().max(1e-3);
        let message = format!(
            "✔ {} ({} frames, {}, {:.1} fps)",
            self.name,
            self.frames,
            format_duration(elapsed),
            fps
        );
        if let Some(spinner) = &self.spinner {
            if let Ok(style) = ProgressStyle::with_template("{msg}") {
                spinner.set_style(style);
            }
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
