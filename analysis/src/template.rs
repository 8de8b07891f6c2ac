use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, RgbaImage};
use reader::{LogReader, Palette};
use structures::{Action, Coord, PlacementEvent, TemplateStats};
use tracing::{debug, warn};

use crate::errors::AnalysisError;
use crate::raster::{load_rgb, load_rgba, pixel_at};

/// Per-coordinate counts of contributing and griefing placements.
///
/// A coordinate is held by at most one of the two maps at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributionState {
    contributing: HashMap<Coord, u64>,
    griefed: HashMap<Coord, u64>,
}

impl AttributionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contribute(&mut self, coord: Coord) {
        *self.contributing.entry(coord).or_insert(0) += 1;
        self.griefed.remove(&coord);
    }

    pub fn grief(&mut self, coord: Coord) {
        *self.griefed.entry(coord).or_insert(0) += 1;
        self.contributing.remove(&coord);
    }

    /// A no-op when neither map holds `coord`.
    pub fn undo(&mut self, coord: Coord) {
        decrement(&mut self.contributing, coord);
        decrement(&mut self.griefed, coord);
    }

    pub fn contributing(&self) -> &HashMap<Coord, u64> {
        &self.contributing
    }

    pub fn griefed(&self) -> &HashMap<Coord, u64> {
        &self.griefed
    }

    pub fn contributing_total(&self) -> u64 {
        self.contributing.values().sum()
    }

    pub fn griefed_total(&self) -> u64 {
        self.griefed.values().sum()
    }

    pub fn stats(&self) -> TemplateStats {
        let griefed = self.griefed_total();
        TemplateStats {
            net: self.contributing_total() as i64 - griefed as i64,
            griefed,
        }
    }
}

fn decrement(counts: &mut HashMap<Coord, u64>, coord: Coord) {
    if let Some(count) = counts.get_mut(&coord) {
        *count -= 1;
        if *count == 0 {
            counts.remove(&coord);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No overlay covers the coordinate.
    Outside,
    Correct,
    /// Wrong color, but the overlay wants the untouched canvas color here.
    Virgin,
    Griefed,
}

/// Overlays for one tracked canvas plus its initial snapshot.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    overlays: Vec<RgbaImage>,
    initial: RgbImage,
}

impl TemplateSet {
    pub fn new(overlays: Vec<RgbaImage>, initial: RgbImage) -> Self {
        Self { overlays, initial }
    }

    /// Loads every `.png` in `template_dir` as an overlay. A missing
    /// directory yields no overlays; an overlay that fails to decode is
    /// skipped.
    pub fn load(template_dir: &Path, initial_canvas: &Path) -> Result<Self, AnalysisError> {
        let initial = load_rgb(initial_canvas)?;

        let mut overlays = Vec::new();
        for path in overlay_paths(template_dir)? {
            match load_rgba(&path) {
                Ok(overlay) => overlays.push(overlay),
                Err(err) => warn!(%err, "skipping template"),
            }
        }

        if overlays.is_empty() {
            warn!(dir = %template_dir.display(), "no template overlays found");
        } else {
            debug!(dir = %template_dir.display(), overlays = overlays.len(), "loaded templates");
        }

        Ok(Self { overlays, initial })
    }

    fn target_at(&self, coord: Coord, untouched: Rgb<u8>) -> CellTarget {
        let mut target = CellTarget::default();

        for overlay in &self.overlays {
            let Some(pixel) = pixel_at(overlay, coord) else {
                continue;
            };
            let [r, g, b, a] = pixel.0;
            if a == 0 {
                continue;
            }

            let color = Rgb([r, g, b]);
            if color == untouched {
                target.virgin = true;
            }
            if !target.colors.contains(&color) {
                target.colors.push(color);
            }
        }

        target
    }
}

fn overlay_paths(template_dir: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    let entries = match fs::read_dir(template_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AnalysisError::TemplateDir {
                path: template_dir.to_path_buf(),
                source,
            })
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    Ok(paths)
}

/// What the overlays ask for at one coordinate.
#[derive(Debug, Clone, Default)]
struct CellTarget {
    colors: Vec<Rgb<u8>>,
    virgin: bool,
}

/// Replays placements against a [`TemplateSet`].
///
/// Overlay lookups are memoized per coordinate, so a classifier must not
/// outlive the template set and palette it was built from.
pub struct TemplateClassifier<'a> {
    palette: &'a Palette,
    templates: &'a TemplateSet,
    cache: HashMap<Coord, CellTarget>,
}

impl<'a> TemplateClassifier<'a> {
    pub fn new(palette: &'a Palette, templates: &'a TemplateSet) -> Self {
        Self {
            palette,
            templates,
            cache: HashMap::new(),
        }
    }

    /// `None` when `coord` is off the initial canvas.
    pub fn classify(&mut self, coord: Coord, placed: Rgb<u8>) -> Option<Classification> {
        let untouched = pixel_at(&self.templates.initial, coord)?;
        let templates = self.templates;
        let target = self
            .cache
            .entry(coord)
            .or_insert_with(|| templates.target_at(coord, untouched));

        let classification = if target.colors.is_empty() {
            Classification::Outside
        } else if target.colors.contains(&placed) {
            Classification::Correct
        } else if target.virgin {
            Classification::Virgin
        } else {
            Classification::Griefed
        };

        Some(classification)
    }

    /// Events whose palette index is out of range are skipped, undos included.
    pub fn replay<I>(mut self, events: I) -> AttributionState
    where
        I: IntoIterator<Item = PlacementEvent>,
    {
        let mut state = AttributionState::new();

        for event in events {
            let Some(placed) = self.palette.get(event.color_index) else {
                continue;
            };

            match event.action {
                Action::Undo => state.undo(event.coord),
                Action::Place => match self.classify(event.coord, placed) {
                    Some(Classification::Correct | Classification::Virgin) => {
                        state.contribute(event.coord)
                    }
                    Some(Classification::Griefed) => state.grief(event.coord),
                    Some(Classification::Outside) | None => {}
                },
                Action::ModOverwrite => {}
            }
        }

        state
    }
}

/// Tracked-goal totals for one user log, zero if anything it needs is unreadable.
pub fn tracked_goal_in_log(
    log: &Path,
    palette: &Palette,
    template_dir: &Path,
    initial_canvas: &Path,
) -> TemplateStats {
    match try_tracked_goal(log, palette, template_dir, initial_canvas) {
        Ok(stats) => stats,
        Err(err) => {
            warn!(%err, log = %log.display(), "could not count tracked-goal pixels");
            TemplateStats::default()
        }
    }
}

fn try_tracked_goal(
    log: &Path,
    palette: &Palette,
    template_dir: &Path,
    initial_canvas: &Path,
) -> Result<TemplateStats, AnalysisError> {
    if palette.is_empty() {
        return Err(AnalysisError::EmptyPalette);
    }

    let templates = TemplateSet::load(template_dir, initial_canvas)?;
    let events = LogReader::open(log)?;

    Ok(TemplateClassifier::new(palette, &templates)
        .replay(events)
        .stats())
}
