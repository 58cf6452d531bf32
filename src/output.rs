use std::fs;
use std::path::{Path, PathBuf};

use crate::dna::Genome;
use crate::engine::{EngineEvent, EventSink};
use crate::error::Result;
use crate::render::Renderer;

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

/// writes the final render and the generation snapshots of a run
pub struct ResultWriter<R: Renderer> {
    renderer: R,
    output: PathBuf,
}

impl<R: Renderer> ResultWriter<R> {
    pub fn new(renderer: R, output: impl Into<PathBuf>) -> Self {
        Self { renderer, output: output.into() }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// render `genome` to the output path
    pub fn write_final(&self, genome: &Genome) -> Result<PathBuf> {
        profiling::scope!("ResultWriter::write_final");
        ensure_parent(&self.output)?;
        self.renderer.render(genome)?.save(&self.output)?;
        Ok(self.output.clone())
    }

    /// `out.png` -> `out_gen003.png`, next to the output
    pub fn generation_path(&self, index: usize) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_owned());
        let ext = self
            .output
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_owned());
        self.output.with_file_name(format!("{}_gen{:03}.{}", stem, index, ext))
    }

    /// one image per snapshot, oldest first
    pub fn write_generations(&self, generations: &[Genome]) -> Result<Vec<PathBuf>> {
        profiling::scope!("ResultWriter::write_generations");
        ensure_parent(&self.output)?;
        generations
            .iter()
            .enumerate()
            .map(|(i, genome)| {
                let path = self.generation_path(i);
                self.renderer.render(genome)?.save(&path)?;
                Ok(path)
            })
            .collect()
    }
}

/// event sink that saves a frame whenever the accepted scene changes for the better.
/// with `min_save`, a frame is only written if it beats the last frame written.
pub struct FrameWriter<R: Renderer> {
    renderer: R,
    dir: PathBuf,
    min_save: bool,
    last_saved: Option<f64>,
    written: usize,
}

impl<R: Renderer> FrameWriter<R> {
    pub fn new(renderer: R, dir: impl Into<PathBuf>, min_save: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            renderer,
            dir,
            min_save,
            last_saved: None,
            written: 0,
        })
    }

    /// frames written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn frame_path(&self, evaluation: u64) -> PathBuf {
        self.dir.join(format!("frame_{:08}.png", evaluation))
    }

    fn save_frame(&mut self, evaluation: u64, loss: f64, genome: &Genome) -> Result<()> {
        if self.min_save && self.last_saved.is_some_and(|best| loss >= best) {
            return Ok(());
        }
        profiling::scope!("FrameWriter::save_frame");
        self.renderer.render(genome)?.save(self.frame_path(evaluation))?;
        self.last_saved = Some(self.last_saved.map_or(loss, |best| best.min(loss)));
        self.written += 1;
        Ok(())
    }
}

impl<R: Renderer> EventSink for FrameWriter<R> {
    fn on_event(&mut self, event: &EngineEvent, genome: &Genome) -> Result<()> {
        match *event {
            EngineEvent::Started { loss, .. } => self.save_frame(0, loss, genome),
            EngineEvent::Improved { evaluation, loss, .. } | EngineEvent::Grew { evaluation, loss, .. } => {
                self.save_frame(evaluation, loss, genome)
            }
            _ => Ok(()),
        }
    }
}
