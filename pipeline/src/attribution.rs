use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use analysis::{activity, counter, survival, template};
use anyhow::Context;
use reader::{Palette, PaletteCache};
use structures::{
    AlternateRender, AttributionResult, MostActive, PlacementTally, RenderMode, SurvivalStats,
    TemplateStats,
};
use tempfile::TempDir;
use tokio::task;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::PipelineError;
use crate::gate::Gate;
use crate::keys::KeyStore;
use crate::tools::{self, RenderJob};
use crate::validate::{is_valid_canvas, is_valid_key};

/// Turns a user's log key into placement statistics and a placemap.
///
/// Every run, including alternate renders, holds one slot of the shared
/// [`Gate`] from the first tool invocation until it returns.
#[derive(Clone)]
pub struct AttributionPipeline {
    config: Arc<Config>,
    keys: Arc<dyn KeyStore>,
    palettes: Arc<PaletteCache>,
    gate: Gate,
}

impl AttributionPipeline {
    pub fn new(
        config: Arc<Config>,
        keys: Arc<dyn KeyStore>,
        palettes: Arc<PaletteCache>,
        gate: Gate,
    ) -> Self {
        Self {
            config,
            keys,
            palettes,
            gate,
        }
    }

    pub async fn run(&self, user: u64, canvas: &str) -> Result<AttributionResult, PipelineError> {
        let key = self.validate(user, canvas)?;
        let full_log = self.config.full_log(canvas);
        if !exists(&full_log).await {
            return Err(PipelineError::MissingSourceLog {
                canvas: canvas.to_string(),
                path: full_log,
            });
        }

        let _pass = self.gate.enter().await?;
        info!(user, canvas, "generating placemap");

        // Each run filters into its own scratch directory and only replaces
        // the shared user log once it has succeeded.
        let user_log = self.config.user_log(user, canvas);
        let scratch = scratch_dir(&self.config.user_logs_dir()).await?;
        let scoped_log = scratch.path().join(file_name(&user_log)?);

        let started = Instant::now();
        tools::filter(&self.config.filter, canvas, &key, &full_log, &scoped_log).await?;
        info!(canvas, stage = "filter", elapsed_ms = elapsed_ms(started), "stage finished");

        let palette_path = self.config.palette(canvas);
        let palette = self.palette(palette_path.clone()).await?;

        let (tally, most_active, survival, tracked) = tokio::try_join!(
            self.count(canvas, &scoped_log),
            self.most_active(canvas, &scoped_log),
            self.survival(canvas, &scoped_log, &palette),
            self.tracked_goal(canvas, &scoped_log, &palette),
        )?;

        let placemap = self.config.placemap(user, canvas, RenderMode::Normal);
        self.render(RenderJob {
            canvas,
            mode: RenderMode::Normal,
            user_log: &scoped_log,
            background: &self.config.background(canvas),
            palette: &palette_path,
            output: &placemap.path,
        })
        .await?;

        tokio::fs::rename(&scoped_log, &user_log)
            .await
            .with_context(|| format!("could not publish user log {}", user_log.display()))?;
        info!(user, canvas, elapsed_ms = elapsed_ms(started), "placemap ready");

        Ok(AttributionResult {
            canvas: canvas.to_string(),
            user,
            tally,
            most_active,
            survived_percent: survival.percentage(tally.net()),
            survival,
            tracked,
            placemap,
            user_log,
        })
    }

    /// Renders the user log left by an earlier [`run`](Self::run) in another
    /// mode, without filtering again.
    pub async fn render_alternate(
        &self,
        user: u64,
        canvas: &str,
        mode: RenderMode,
    ) -> Result<AlternateRender, PipelineError> {
        if !is_valid_canvas(canvas) {
            return Err(PipelineError::InvalidCanvasFormat(canvas.to_string()));
        }

        let user_log = self.config.user_log(user, canvas);
        if !exists(&user_log).await {
            return Err(PipelineError::MissingSourceLog {
                canvas: canvas.to_string(),
                path: user_log,
            });
        }

        let _pass = self.gate.enter().await?;
        info!(user, canvas, %mode, "rendering alternate placemap");

        let most_active = match mode {
            RenderMode::Activity => Some(self.most_active(canvas, &user_log).await?),
            RenderMode::Normal | RenderMode::Age => None,
        };

        let placemap = self.config.placemap(user, canvas, mode);
        self.render(RenderJob {
            canvas,
            mode,
            user_log: &user_log,
            background: &self.config.background(canvas),
            palette: &self.config.palette(canvas),
            output: &placemap.path,
        })
        .await?;

        Ok(AlternateRender {
            placemap,
            most_active,
        })
    }

    /// Returns the key on success. The key itself never reaches a log line.
    fn validate(&self, user: u64, canvas: &str) -> Result<String, PipelineError> {
        if !is_valid_canvas(canvas) {
            return Err(PipelineError::InvalidCanvasFormat(canvas.to_string()));
        }

        let key = self
            .keys
            .logkey(user, canvas)
            .ok_or_else(|| PipelineError::NoKeyRegistered {
                user,
                canvas: canvas.to_string(),
            })?;

        if !is_valid_key(&key) {
            return Err(PipelineError::InvalidKeyFormat {
                user,
                canvas: canvas.to_string(),
            });
        }

        Ok(key)
    }

    /// An unreadable palette becomes an empty one, which the survival and
    /// tracked-goal stages treat as zero.
    async fn palette(&self, path: PathBuf) -> Result<Arc<Palette>, PipelineError> {
        let palettes = Arc::clone(&self.palettes);
        let palette = task::spawn_blocking(move || match palettes.get_or_decode(&path) {
            Ok(palette) => palette,
            Err(err) => {
                warn!(%err, "palette unavailable");
                Arc::new(Palette::default())
            }
        })
        .await
        .context("palette worker failed")?;

        Ok(palette)
    }

    async fn count(&self, canvas: &str, log: &Path) -> Result<PlacementTally, PipelineError> {
        let log = log.to_path_buf();
        offload(canvas, "count", move || counter::count_in_log(&log)).await
    }

    async fn most_active(&self, canvas: &str, log: &Path) -> Result<MostActive, PipelineError> {
        let log = log.to_path_buf();
        offload(canvas, "activity", move || activity::most_active_in_log(&log)).await
    }

    async fn survival(
        &self,
        canvas: &str,
        log: &Path,
        palette: &Arc<Palette>,
    ) -> Result<SurvivalStats, PipelineError> {
        let log = log.to_path_buf();
        let palette = Arc::clone(palette);
        let final_canvas = self.config.final_canvas(canvas);
        offload(canvas, "survival", move || {
            survival::survival_in_log(&log, &palette, &final_canvas)
        })
        .await
    }

    async fn tracked_goal(
        &self,
        canvas: &str,
        log: &Path,
        palette: &Arc<Palette>,
    ) -> Result<Option<TemplateStats>, PipelineError> {
        if !self.config.is_tracked(canvas) {
            return Ok(None);
        }

        let log = log.to_path_buf();
        let palette = Arc::clone(palette);
        let templates = self.config.templates(canvas);
        let initial = self.config.initial_canvas(canvas);
        let stats = offload(canvas, "tracked goal", move || {
            template::tracked_goal_in_log(&log, &palette, &templates, &initial)
        })
        .await?;

        Ok(Some(stats))
    }

    async fn render(&self, job: RenderJob<'_>) -> Result<(), PipelineError> {
        let started = Instant::now();
        tools::render(&self.config.render, job).await?;
        info!(
            canvas = job.canvas,
            stage = "render",
            mode = %job.mode,
            elapsed_ms = elapsed_ms(started),
            "stage finished"
        );
        Ok(())
    }
}

/// Runs one replay on the blocking pool so tool waits elsewhere keep moving.
async fn offload<T, F>(canvas: &str, stage: &'static str, work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let started = Instant::now();
    let value = task::spawn_blocking(work)
        .await
        .with_context(|| format!("{} worker failed", stage))?;

    info!(canvas, stage, elapsed_ms = elapsed_ms(started), "stage finished");
    Ok(value)
}

/// Removed with its contents when dropped, so a failed or cancelled run
/// leaves nothing behind.
async fn scratch_dir(parent: &Path) -> anyhow::Result<TempDir> {
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("failed to create '{}'", parent.display()))?;

    let parent = parent.to_path_buf();
    task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".filter-")
            .tempdir_in(&parent)
            .with_context(|| format!("failed to create scratch dir in '{}'", parent.display()))
    })
    .await
    .context("scratch dir worker failed")?
}

fn file_name(path: &Path) -> anyhow::Result<&OsStr> {
    path.file_name()
        .with_context(|| format!("'{}' has no file name", path.display()))
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
