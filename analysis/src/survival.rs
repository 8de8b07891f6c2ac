use std::collections::HashMap;
use std::path::Path;

use image::RgbImage;
use reader::{LogReader, Palette};
use structures::{Action, Coord, PlacementEvent, SurvivalStats};
use tracing::warn;

use crate::errors::AnalysisError;
use crate::raster::{load_rgb, pixel_at};

/// The color index a user last left at each coordinate, after undos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalState {
    pub colors: HashMap<Coord, u32>,
    pub replaced_by_self: u64,
}

pub fn replay<I>(events: I) -> FinalState
where
    I: IntoIterator<Item = PlacementEvent>,
{
    let mut state = FinalState::default();

    for event in events {
        match event.action {
            Action::Place => {
                if state.colors.insert(event.coord, event.color_index).is_some() {
                    state.replaced_by_self += 1;
                }
            }
            Action::Undo => {
                state.colors.remove(&event.coord);
            }
            Action::ModOverwrite => {}
        }
    }

    state
}

/// Coordinates off the canvas or with an unknown palette index count as
/// neither survived nor replaced.
pub fn compare(state: &FinalState, palette: &Palette, final_canvas: &RgbImage) -> SurvivalStats {
    let mut stats = SurvivalStats {
        replaced_by_self: state.replaced_by_self,
        ..Default::default()
    };

    for (coord, index) in &state.colors {
        let Some(finished) = pixel_at(final_canvas, *coord) else {
            continue;
        };
        let Some(placed) = palette.get(*index) else {
            continue;
        };

        if placed == finished {
            stats.survived += 1;
        } else {
            stats.replaced_by_others += 1;
        }
    }

    stats
}

pub fn survival_in_log(log: &Path, palette: &Palette, final_canvas: &Path) -> SurvivalStats {
    match try_survival(log, palette, final_canvas) {
        Ok(stats) => stats,
        Err(err) => {
            warn!(%err, log = %log.display(), "could not compute survival");
            SurvivalStats::default()
        }
    }
}

fn try_survival(
    log: &Path,
    palette: &Palette,
    final_canvas: &Path,
) -> Result<SurvivalStats, AnalysisError> {
    if palette.is_empty() {
        return Err(AnalysisError::EmptyPalette);
    }

    let state = replay(LogReader::open(log)?);
    let canvas = load_rgb(final_canvas)?;

    Ok(compare(&state, palette, &canvas))
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn palette() -> Palette {
        Palette::new(vec![WHITE, RED, BLUE])
    }

    #[test]
    fn replay_tracks_last_color_and_self_replacements() {
        let log = "t\th\t1\t1\t1\tuser place\n\
t\th\t1\t1\t2\tuser place\n\
t\th\t2\t2\t1\tuser place\n\
t\th\t2\t2\t1\tuser undo\n\
t\th\t3\t3\t1\tmod overwrite\n";

        let state = replay(LogReader::new(log.as_bytes()));

        assert_eq!(state.colors.len(), 1);
        assert_eq!(state.colors.get(&Coord::new(1, 1)), Some(&2));
        assert_eq!(state.replaced_by_self, 1);
    }

    #[test]
    fn compares_against_finished_canvas() {
        let mut canvas = RgbImage::from_pixel(4, 4, WHITE);
        canvas.put_pixel(0, 0, RED);
        canvas.put_pixel(1, 0, BLUE);

        let log = "t\th\t0\t0\t1\tuser place\n\
t\th\t1\t0\t1\tuser place\n\
t\th\t2\t0\t0\tuser place\n\
t\th\t9\t9\t1\tuser place\n\
t\th\t3\t3\t7\tuser place\n";
        let state = replay(LogReader::new(log.as_bytes()));

        let stats = compare(&state, &palette(), &canvas);

        assert_eq!(
            stats,
            SurvivalStats {
                survived: 2,
                replaced_by_others: 1,
                replaced_by_self: 0,
            }
        );
    }

    #[test]
    fn empty_log_survives_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("user.log");
        std::fs::write(&log, "").unwrap();
        let canvas = dir.path().join("final.png");
        RgbImage::from_pixel(4, 4, WHITE).save(&canvas).unwrap();

        assert_eq!(
            survival_in_log(&log, &palette(), &canvas),
            SurvivalStats::default()
        );
    }

    #[test]
    fn missing_canvas_or_palette_degrades_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("user.log");
        std::fs::write(&log, "t\th\t0\t0\t1\tuser place\n").unwrap();
        let canvas = dir.path().join("final.png");

        assert_eq!(
            survival_in_log(&log, &palette(), &canvas),
            SurvivalStats::default()
        );

        RgbImage::from_pixel(4, 4, RED).save(&canvas).unwrap();
        assert_eq!(
            survival_in_log(&log, &Palette::default(), &canvas),
            SurvivalStats::default()
        );
        assert_eq!(survival_in_log(&log, &palette(), &canvas).survived, 1);
    }
}
