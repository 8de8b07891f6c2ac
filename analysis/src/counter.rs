use std::path::Path;

use reader::ActionReader;
use structures::{Action, PlacementTally};
use tracing::warn;

/// Counts actions by their text alone, so rows whose coordinates or color
/// index do not parse still count.
pub fn count<I>(actions: I) -> PlacementTally
where
    I: IntoIterator<Item = Action>,
{
    let mut tally = PlacementTally::default();

    for action in actions {
        match action {
            Action::Place => tally.placed += 1,
            Action::Undo => tally.undone += 1,
            Action::ModOverwrite => tally.mod_overwrites += 1,
        }
    }

    tally
}

pub fn count_in_log(log: &Path) -> PlacementTally {
    match ActionReader::open(log) {
        Ok(actions) => count(actions),
        Err(err) => {
            warn!(%err, "could not count placements");
            PlacementTally::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "t\th\t1\t1\t0\tuser place\n\
t\th\t1\t1\t0\tuser undo\n\
t\th\t2\t1\t0\tuser place\n\
t\th\t2\t1\t0\tmod overwrite\n\
t\th\t3\t1\t0\tuser place\n";

    #[test]
    fn counts_each_action() {
        let tally = count(ActionReader::new(LOG.as_bytes()));

        assert_eq!(
            tally,
            PlacementTally {
                placed: 3,
                undone: 1,
                mod_overwrites: 1,
            }
        );
        assert_eq!(tally.net(), 2);
    }

    #[test]
    fn undos_beyond_places_give_negative_net() {
        let log = "t\th\t1\t1\t0\tuser undo\nt\th\t1\t1\t0\tuser undo\n";
        assert_eq!(count(ActionReader::new(log.as_bytes())).net(), -2);
    }

    #[test]
    fn malformed_fields_still_count() {
        let log = "t\th\t5\t5\t\tuser place\n\
t\th\t5\t5\t2\tuser place\n\
t\th\t-1\t5\t2\tuser undo\n";

        let tally = count(ActionReader::new(log.as_bytes()));

        assert_eq!(tally.placed, 2);
        assert_eq!(tally.undone, 1);
        assert_eq!(tally.net(), 1);
    }

    #[test]
    fn empty_log_counts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        std::fs::write(&path, "").unwrap();

        assert_eq!(count_in_log(&path), PlacementTally::default());
    }

    #[test]
    fn missing_log_counts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            count_in_log(&dir.path().join("missing.log")),
            PlacementTally::default()
        );
    }
}
