use std::collections::HashMap;

use serde_derive::Serialize;

use crate::config::Rank;

pub const GRIEFER: &str = "griefer";
pub const UNRANKED: &str = "nothing";

/// Read side of the score store that persists attribution totals.
pub trait ScoreStore {
    fn net_pixels(&self, identity: &str) -> i64;
}

impl ScoreStore for HashMap<String, i64> {
    fn net_pixels(&self, identity: &str) -> i64 {
        self.get(identity).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub total: i64,
    pub rank: String,
}

impl Standing {
    /// `ranks` is ordered highest threshold first; the first one met wins.
    pub fn lookup<S: ScoreStore + ?Sized>(store: &S, identity: &str, ranks: &[Rank]) -> Standing {
        let total = store.net_pixels(identity);
        Standing {
            total,
            rank: rank_for(total, ranks).to_string(),
        }
    }
}

pub fn rank_for(total: i64, ranks: &[Rank]) -> &str {
    if total < 0 {
        return GRIEFER;
    }

    ranks
        .iter()
        .find(|rank| total >= rank.threshold)
        .map_or(UNRANKED, |rank| rank.name.as_str())
}
