use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[macro_use]
extern crate serde_derive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Place,
    Undo,
    ModOverwrite,
}

/// One row of a placement log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementEvent {
    pub coord: Coord,
    pub color_index: u32,
    pub action: Action,
    /// Every tab-separated field of the row, untrimmed.
    pub raw_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlacementTally {
    pub placed: u64,
    pub undone: u64,
    pub mod_overwrites: u64,
}

impl PlacementTally {
    /// Places minus undos. Negative when a log records more undos than places.
    pub fn net(&self) -> i64 {
        self.placed as i64 - self.undone as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MostActive {
    pub coord: Coord,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurvivalStats {
    pub survived: u64,
    /// Final-state pixels that differ from the finished canvas. Only considers
    /// the user's own log, so it cannot tell griefing apart from ordinary
    /// contention.
    pub replaced_by_others: u64,
    /// Places that landed on a coordinate the user already held.
    pub replaced_by_self: u64,
}

impl SurvivalStats {
    pub fn percentage(&self, net_placed: i64) -> f64 {
        if net_placed <= 0 {
            return 0.0;
        }

        self.survived as f64 / net_placed as f64 * 100.0
    }
}

/// Tracked-goal totals for one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateStats {
    /// Contributing minus griefed. This is the figure shown as "pixels for the goal".
    pub net: i64,
    pub griefed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    Normal,
    Activity,
    Age,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Normal => "normal",
            RenderMode::Activity => "activity",
            RenderMode::Age => "age",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(RenderMode::Normal),
            "activity" => Ok(RenderMode::Activity),
            "age" => Ok(RenderMode::Age),
            other => Err(format!("unknown render mode: {}", other)),
        }
    }
}

/// A rendered placemap on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placemap {
    pub mode: RenderMode,
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub canvas: String,
    pub user: u64,
    pub tally: PlacementTally,
    pub most_active: MostActive,
    pub survival: SurvivalStats,
    pub survived_percent: f64,
    /// Only present for tracked canvases.
    pub tracked: Option<TemplateStats>,
    pub placemap: Placemap,
    pub user_log: PathBuf,
}

impl fmt::Display for AttributionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pixels Placed: {}", self.tally.net())?;
        writeln!(f, "Undos: {}", self.tally.undone)?;
        writeln!(
            f,
            "Surviving Pixels: {} ({:.2}%)",
            self.survival.survived, self.survived_percent
        )?;
        write!(
            f,
            "Most Active: {} with {} pixels",
            self.most_active.coord, self.most_active.count
        )?;

        if let Some(tracked) = &self.tracked {
            write!(f, "\nPixels for TPE: {}", tracked.net)?;
            write!(f, "\nPixels Griefed: {}", tracked.griefed)?;
        }

        if self.tally.mod_overwrites > 0 {
            write!(f, "\nMod Overwrites: {}", self.tally.mod_overwrites)?;
        }

        Ok(())
    }
}

/// A re-render of an existing user log in another mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateRender {
    pub placemap: Placemap,
    /// Set for activity renders.
    pub most_active: Option<MostActive>,
}

impl fmt::Display for AlternateRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Placemap: {}", self.placemap.filename)?;
        if let Some(most_active) = &self.most_active {
            write!(
                f,
                "\nMost Active: {} with {} pixels",
                most_active.coord, most_active.count
            )?;
        }
        Ok(())
    }
}

/// Per-log outcome of a bulk tracked-goal scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanEntry {
    pub net_placed: i64,
    pub undone: u64,
    pub tpe_net: i64,
    pub tpe_griefed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AttributionResult {
        AttributionResult {
            canvas: "76".to_string(),
            user: 42,
            tally: PlacementTally {
                placed: 12,
                undone: 2,
                mod_overwrites: 0,
            },
            most_active: MostActive {
                coord: Coord::new(3, 4),
                count: 5,
            },
            survival: SurvivalStats {
                survived: 3,
                replaced_by_others: 7,
                replaced_by_self: 1,
            },
            survived_percent: 30.0,
            tracked: None,
            placemap: Placemap {
                mode: RenderMode::Normal,
                filename: "c76_normal_42.png".to_string(),
                path: PathBuf::from("out/c76_normal_42.png"),
            },
            user_log: PathBuf::from("logs/42_pixels_c76.log"),
        }
    }

    #[test]
    fn net_may_go_negative() {
        let tally = PlacementTally {
            placed: 1,
            undone: 3,
            mod_overwrites: 0,
        };
        assert_eq!(tally.net(), -2);
    }

    #[test]
    fn survival_percentage_is_zero_without_net_placements() {
        let stats = SurvivalStats {
            survived: 4,
            ..Default::default()
        };
        assert_eq!(stats.percentage(0), 0.0);
        assert_eq!(stats.percentage(-5), 0.0);
        assert_eq!(stats.percentage(8), 50.0);
    }

    #[test]
    fn render_mode_parses_its_own_names() {
        for mode in [RenderMode::Normal, RenderMode::Activity, RenderMode::Age] {
            assert_eq!(mode.as_str().parse::<RenderMode>(), Ok(mode));
        }
        assert!("sepia".parse::<RenderMode>().is_err());
    }

    #[test]
    fn summary_hides_replacement_counts() {
        let text = sample_result().to_string();
        assert!(text.contains("Pixels Placed: 10"));
        assert!(text.contains("Surviving Pixels: 3 (30.00%)"));
        assert!(text.contains("Most Active: (3, 4) with 5 pixels"));
        assert!(!text.contains("Replaced"));
        assert!(!text.contains("TPE"));
        assert!(!text.contains("Mod Overwrites"));
    }

    #[test]
    fn summary_lists_tracked_goal_and_mod_overwrites_when_present() {
        let mut result = sample_result();
        result.tracked = Some(TemplateStats { net: 6, griefed: 1 });
        result.tally.mod_overwrites = 2;

        let text = result.to_string();
        assert!(text.contains("Pixels for TPE: 6"));
        assert!(text.contains("Pixels Griefed: 1"));
        assert!(text.ends_with("Mod Overwrites: 2"));
    }
}
