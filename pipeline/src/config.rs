use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_derive::Deserialize;
use structures::{Placemap, RenderMode};

/// A program plus the arguments placed before the ones the pipeline adds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Canvases drawn with the palette file `palette_{name}.gpl`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaletteAssignment {
    pub name: String,
    pub canvases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rank {
    pub threshold: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the data tree shared with the filter and render tools.
    pub data_dir: PathBuf,
    /// Holds one `c{canvas}` directory of overlay PNGs per tracked canvas.
    pub template_dir: PathBuf,
    pub filter: ToolCommand,
    pub render: ToolCommand,
    pub max_concurrent_pipelines: usize,
    pub tracked_canvases: Vec<String>,
    pub default_palette: String,
    pub palettes: Vec<PaletteAssignment>,
    /// Highest threshold first.
    pub ranks: Vec<Rank>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            template_dir: PathBuf::from("template"),
            filter: ToolCommand::new("filter"),
            render: ToolCommand::new("render"),
            max_concurrent_pipelines: 3,
            tracked_canvases: Vec::new(),
            default_palette: "default".to_string(),
            palettes: Vec::new(),
            ranks: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("could not parse config {}", path.display()))
    }

    pub fn is_tracked(&self, canvas: &str) -> bool {
        self.tracked_canvases.iter().any(|tracked| tracked == canvas)
    }

    pub fn palette_name(&self, canvas: &str) -> &str {
        self.palettes
            .iter()
            .find(|assignment| assignment.canvases.iter().any(|c| c == canvas))
            .map_or(self.default_palette.as_str(), |assignment| assignment.name.as_str())
    }

    pub fn full_log(&self, canvas: &str) -> PathBuf {
        self.data_dir
            .join("pxls-logs")
            .join(format!("pixels_c{}.sanit.log", canvas))
    }

    pub fn user_logs_dir(&self) -> PathBuf {
        self.data_dir.join("pxls-userlogs")
    }

    pub fn user_log(&self, user: u64, canvas: &str) -> PathBuf {
        self.user_logs_dir()
            .join(format!("{}_pixels_c{}.log", user, canvas))
    }

    /// The empty canvas the render tool draws onto.
    pub fn background(&self, canvas: &str) -> PathBuf {
        self.data_dir
            .join("pxls-canvas")
            .join(format!("canvas-{}-initial-empty.png", canvas))
    }

    pub fn initial_canvas(&self, canvas: &str) -> PathBuf {
        self.data_dir
            .join("pxls-canvas")
            .join(format!("canvas-{}-initial.png", canvas))
    }

    pub fn final_canvas(&self, canvas: &str) -> PathBuf {
        self.data_dir
            .join("pxls-final-canvas")
            .join(format!("canvas-{}-final.png", canvas))
    }

    pub fn palette(&self, canvas: &str) -> PathBuf {
        self.data_dir
            .join("pxls-palette")
            .join(format!("palette_{}.gpl", self.palette_name(canvas)))
    }

    pub fn templates(&self, canvas: &str) -> PathBuf {
        self.template_dir.join(format!("c{}", canvas))
    }

    pub fn placemap(&self, user: u64, canvas: &str, mode: RenderMode) -> Placemap {
        let filename = format!("c{}_{}_{}.png", canvas, mode, user);
        Placemap {
            mode,
            path: self.data_dir.join("pxls-out").join(&filename),
            filename,
        }
    }
}
