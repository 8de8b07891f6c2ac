//! Tracked-goal totals over every user log already on disk.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use analysis::{counter, template};
use anyhow::Context;
use reader::{Palette, PaletteCache};
use regex::Regex;
use structures::ScanEntry;
use tokio::{fs, task};
use tracing::{info, warn};

use crate::config::Config;

/// How often, in finished logs, progress is reported.
pub const PROGRESS_EVERY: usize = 10;

const USER_LOG_PATTERN: &str = r"^(\d+)_pixels_c(.+)\.log$";

/// A user-scoped log left behind by the filter tool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserLog {
    pub canvas: String,
    pub user: u64,
    pub path: PathBuf,
}

/// For callers that do not report progress.
pub fn no_progress(_unit: &str, _completed: usize, _total: usize) {}

/// Finds `{user}_pixels_c{canvas}.log` files in `dir`, sorted by canvas then
/// user. A missing directory holds no logs.
pub async fn discover_user_logs(dir: &Path) -> anyhow::Result<Vec<UserLog>> {
    let pattern = Regex::new(USER_LOG_PATTERN)?;

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("could not list {}", dir.display()))
        }
    };

    let mut logs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("could not list {}", dir.display()))?
    {
        let name = entry.file_name();
        let Some(captures) = name.to_str().and_then(|name| pattern.captures(name)) else {
            continue;
        };
        let Ok(user) = captures[1].parse::<u64>() else {
            continue;
        };

        logs.push(UserLog {
            canvas: captures[2].to_string(),
            user,
            path: entry.path(),
        });
    }

    logs.sort();
    Ok(logs)
}

pub struct Scanner {
    config: Arc<Config>,
    palettes: Arc<PaletteCache>,
}

impl Scanner {
    pub fn new(config: Arc<Config>, palettes: Arc<PaletteCache>) -> Self {
        Self { config, palettes }
    }

    /// One entry per tracked canvas `user` has a log for, keyed by canvas.
    pub async fn scan_user<P>(
        &self,
        user: u64,
        mut progress: P,
    ) -> anyhow::Result<BTreeMap<String, ScanEntry>>
    where
        P: FnMut(&str, usize, usize),
    {
        let logs: Vec<UserLog> = discover_user_logs(&self.config.user_logs_dir())
            .await?
            .into_iter()
            .filter(|log| log.user == user && self.config.is_tracked(&log.canvas))
            .collect();

        let mut entries = BTreeMap::new();
        let total = logs.len();
        for (done, log) in logs.into_iter().enumerate() {
            let entry = self.scan_log(&log).await;
            report(&mut progress, &log.canvas, done + 1, total);
            entries.insert(log.canvas, entry);
        }

        Ok(entries)
    }

    /// One entry per user with a log for `canvas`, keyed by user. Empty for
    /// canvases that are not tracked.
    pub async fn scan_canvas<P>(
        &self,
        canvas: &str,
        mut progress: P,
    ) -> anyhow::Result<BTreeMap<u64, ScanEntry>>
    where
        P: FnMut(&str, usize, usize),
    {
        if !self.config.is_tracked(canvas) {
            info!(canvas, "canvas is not tracked, nothing to scan");
            return Ok(BTreeMap::new());
        }

        let logs: Vec<UserLog> = discover_user_logs(&self.config.user_logs_dir())
            .await?
            .into_iter()
            .filter(|log| log.canvas == canvas)
            .collect();

        let mut entries = BTreeMap::new();
        let total = logs.len();
        for (done, log) in logs.into_iter().enumerate() {
            let entry = self.scan_log(&log).await;
            report(&mut progress, &log.user.to_string(), done + 1, total);
            entries.insert(log.user, entry);
        }

        Ok(entries)
    }

    /// Never fails: anything unreadable counts as zero.
    async fn scan_log(&self, log: &UserLog) -> ScanEntry {
        let palettes = Arc::clone(&self.palettes);
        let palette_path = self.config.palette(&log.canvas);
        let templates = self.config.templates(&log.canvas);
        let initial = self.config.initial_canvas(&log.canvas);
        let path = log.path.clone();

        let scanned = task::spawn_blocking(move || {
            let palette = palettes.get_or_decode(&palette_path).unwrap_or_else(|err| {
                warn!(%err, "palette unavailable");
                Arc::new(Palette::default())
            });
            let tally = counter::count_in_log(&path);
            let tracked = template::tracked_goal_in_log(&path, &palette, &templates, &initial);

            ScanEntry {
                net_placed: tally.net(),
                undone: tally.undone,
                tpe_net: tracked.net,
                tpe_griefed: tracked.griefed,
            }
        })
        .await;

        match scanned {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, log = %log.path.display(), "scan worker failed");
                ScanEntry::default()
            }
        }
    }
}

fn report<P>(progress: &mut P, unit: &str, completed: usize, total: usize)
where
    P: FnMut(&str, usize, usize),
{
    if completed % PROGRESS_EVERY == 0 || completed == total {
        progress(unit, completed, total);
    } else {
        info!(unit, completed, total, "scanned log");
    }
}
