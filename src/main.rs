use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use polyhill::engine::{Engine, LogSink, NullSink, Tee};
use polyhill::output::{FrameWriter, ResultWriter};
use polyhill::{CpuRenderer, EngineInit, Raster, Settings};

// ---------------- CLI ---------------------------------------------------------
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Progressive hill-climbing image reconstruction with polygons", long_about = None)]
struct Args {
    /// JSON settings file; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path of the base image
    #[arg(short, long)]
    base_image: Option<PathBuf>,

    /// Path of the output image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum number of polygons in the scene
    #[arg(short = 'p', long)]
    max_polygons: Option<usize>,

    /// Non-improving steps tolerated before growing or rolling back
    #[arg(short, long)]
    stagnation_limit: Option<u32>,

    /// Evaluation budget
    #[arg(short, long)]
    evaluations: Option<u64>,

    /// Vertices per polygon
    #[arg(short, long)]
    vertices: Option<usize>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for frames of accepted improvements
    #[arg(short, long)]
    frames_dir: Option<PathBuf>,

    /// Only save frames that improve on the last saved one
    #[arg(short, long)]
    min_save: bool,

    /// Also render every generation snapshot
    #[arg(short = 'g', long)]
    save_generations: bool,

    /// Disable anti-aliased polygon edges
    #[arg(long)]
    no_anti_alias: bool,

    /// Toggle debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(v) = self.base_image {
            settings.base_image = v;
        }
        if let Some(v) = self.output {
            settings.output = v;
        }
        if let Some(v) = self.max_polygons {
            settings.max_polygons = v;
        }
        if let Some(v) = self.stagnation_limit {
            settings.stagnation_limit = v;
        }
        if let Some(v) = self.evaluations {
            settings.evaluations = v;
        }
        if let Some(v) = self.vertices {
            settings.vertices = v;
        }
        if let Some(v) = self.seed {
            settings.seed = v;
        }
        if let Some(v) = self.frames_dir {
            settings.frames_dir = Some(v);
        }
        settings.min_save |= self.min_save;
        settings.save_generations |= self.save_generations;
        settings.debug |= self.debug;
        if self.no_anti_alias {
            settings.anti_alias = false;
        }
        Ok(settings)
    }
}

fn init_logger(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

// ---------------- MAIN --------------------------------------------------------
fn main() -> Result<()> {
    let settings = Args::parse().into_settings()?;
    init_logger(settings.debug);
    settings.validate().context("invalid settings")?;

    // name rayon's worker threads once at startup
    let _ = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-{i}"))
        .build_global();

    let base = Raster::load(&settings.base_image)
        .with_context(|| format!("failed to load base image {}", settings.base_image.display()))?;
    log::info!(
        "loaded {} ({}x{})",
        settings.base_image.display(),
        base.width(),
        base.height()
    );

    let renderer = CpuRenderer::new(settings.anti_alias);
    let mut engine = Engine::new(EngineInit::from(&settings), base, renderer)?;

    let log_sink = LogSink::default();
    let summary = match &settings.frames_dir {
        Some(dir) => {
            let frames = FrameWriter::new(renderer, dir, settings.min_save)
                .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
            let mut sink = Tee(log_sink, frames);
            let summary = engine.run(&mut sink)?;
            log::info!("wrote {} frames to {}", sink.1.written(), dir.display());
            summary
        }
        None => engine.run(&mut Tee(log_sink, NullSink))?,
    };

    let writer = ResultWriter::new(renderer, &settings.output);
    let path = writer
        .write_final(&engine.genome)
        .with_context(|| format!("failed to write {}", settings.output.display()))?;
    let sidecar = settings.sidecar_path();
    settings
        .save(&sidecar)
        .with_context(|| format!("failed to save settings to {}", sidecar.display()))?;
    log::debug!("settings saved to {}", sidecar.display());
    if settings.save_generations {
        let paths = writer
            .write_generations(engine.generations())
            .context("failed to write generation snapshots")?;
        log::info!("wrote {} generation snapshots", paths.len());
    }

    log::info!(
        "done: {} polygons, loss {:.3}, {:.2}% complete, {:.2} dB. output: {}",
        summary.polygons,
        summary.loss,
        summary.metrics.complete_pct,
        summary.metrics.psnr,
        path.display()
    );
    Ok(())
}
