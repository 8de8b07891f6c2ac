use std::collections::HashMap;
use std::path::Path;

use reader::LogReader;
use structures::{Action, Coord, MostActive, PlacementEvent};
use tracing::warn;

/// The coordinate with the most place events. Undos are not subtracted.
///
/// Ties go to the coordinate placed on first. An empty log gives `(0, 0)`
/// with a count of zero.
pub fn most_active<I>(events: I) -> MostActive
where
    I: IntoIterator<Item = PlacementEvent>,
{
    // coord -> (count, order of first placement)
    let mut counts: HashMap<Coord, (u64, usize)> = HashMap::new();

    let places = events
        .into_iter()
        .filter(|event| event.action == Action::Place);
    for (order, event) in places.enumerate() {
        counts.entry(event.coord).or_insert((0, order)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (a_count, a_first)), (_, (b_count, b_first))| {
            a_count.cmp(b_count).then(b_first.cmp(a_first))
        })
        .map(|(coord, (count, _))| MostActive { coord, count })
        .unwrap_or_default()
}

pub fn most_active_in_log(log: &Path) -> MostActive {
    match LogReader::open(log) {
        Ok(events) => most_active(events),
        Err(err) => {
            warn!(%err, "could not find most active pixel");
            MostActive::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(log: &str) -> MostActive {
        most_active(LogReader::new(log.as_bytes()))
    }

    #[test]
    fn finds_most_placed_coordinate() {
        let log = "t\th\t1\t1\t0\tuser place\n\
t\th\t4\t2\t0\tuser place\n\
t\th\t4\t2\t1\tuser place\n\
t\th\t4\t2\t1\tuser undo\n\
t\th\t1\t1\t0\tuser undo\n";

        assert_eq!(
            run(log),
            MostActive {
                coord: Coord::new(4, 2),
                count: 2,
            }
        );
    }

    #[test]
    fn ties_go_to_first_encountered() {
        let log = "t\th\t9\t9\t0\tuser place\n\
t\th\t1\t1\t0\tuser place\n\
t\th\t1\t1\t0\tuser place\n\
t\th\t9\t9\t0\tuser place\n";

        for _ in 0..10 {
            assert_eq!(run(log).coord, Coord::new(9, 9));
        }
    }

    #[test]
    fn undo_and_mod_rows_are_not_placements() {
        let log = "t\th\t3\t3\t0\tuser undo\n\
t\th\t3\t3\t0\tmod overwrite\n\
t\th\t3\t3\t0\tuser undo\n\
t\th\t5\t5\t0\tuser place\n";

        assert_eq!(run(log).coord, Coord::new(5, 5));
    }

    #[test]
    fn empty_log_is_origin_with_zero() {
        assert_eq!(run(""), MostActive::default());
        assert_eq!(run("").coord, Coord::new(0, 0));
    }
}
