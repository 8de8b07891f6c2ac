use std::fs::File;
use std::io::{BufRead, BufReader, Read, Split};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use structures::{Action, Coord, PlacementEvent};

use crate::errors::ReaderError;

const MIN_FIELDS: usize = 6;

/// Streams placement events out of a tab-delimited log.
///
/// Rows that do not parse are skipped, never reported.
pub struct LogReader<R: Read> {
    records: StringRecordsIntoIter<R>,
}

impl LogReader<File> {
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let file = File::open(path).map_err(|err| ReaderError::io(path, err))?;
        Ok(Self::new(file))
    }
}

impl<R: Read> LogReader<R> {
    pub fn new(reader: R) -> Self {
        let records = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();

        Self { records }
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = PlacementEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            if let Some(event) = record.ok().as_ref().and_then(parse_row) {
                return Some(event);
            }
        }

        None
    }
}

/// The whole tolerance policy for log rows: at least six fields, integer
/// x/y/index in fields 2-4, and an action recognised by substring in field 5.
pub fn parse_row(record: &StringRecord) -> Option<PlacementEvent> {
    if record.len() < MIN_FIELDS {
        return None;
    }

    let x = record.get(2)?.trim().parse::<u32>().ok()?;
    let y = record.get(3)?.trim().parse::<u32>().ok()?;
    let color_index = record.get(4)?.trim().parse::<u32>().ok()?;
    let action = parse_action(record.get(5)?)?;

    Some(PlacementEvent {
        coord: Coord::new(x, y),
        color_index,
        action,
        raw_fields: record.iter().map(String::from).collect(),
    })
}

/// Yields the action named anywhere in each line, whatever the other fields
/// hold. Lines naming no action are skipped; reading stops at an I/O error.
pub struct ActionReader<R: BufRead> {
    lines: Split<R>,
}

impl ActionReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        let file = File::open(path).map_err(|err| ReaderError::io(path, err))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ActionReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
        }
    }
}

impl<R: BufRead> Iterator for ActionReader<R> {
    type Item = Action;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let line = line.ok()?;
            if let Some(action) = parse_action(&String::from_utf8_lossy(&line)) {
                return Some(action);
            }
        }

        None
    }
}

/// Substring match, checked in place, undo, mod overwrite order.
fn parse_action(text: &str) -> Option<Action> {
    if text.contains("user place") {
        Some(Action::Place)
    } else if text.contains("user undo") {
        Some(Action::Undo)
    } else if text.contains("mod overwrite") {
        Some(Action::ModOverwrite)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(log: &str) -> Vec<PlacementEvent> {
        LogReader::new(log.as_bytes()).collect()
    }

    #[test]
    fn parses_well_formed_rows() {
        let log = "2023-01-01 00:00:00,000\thash\t5\t6\t2\tuser place\n\
2023-01-01 00:00:01,000\thash\t5\t6\t2\tuser undo\n\
2023-01-01 00:00:02,000\thash\t 7 \t8\t0\tmod overwrite\n";

        let parsed = events(log);

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].coord, Coord::new(5, 6));
        assert_eq!(parsed[0].color_index, 2);
        assert_eq!(parsed[0].action, Action::Place);
        assert_eq!(parsed[0].raw_fields.len(), 6);
        assert_eq!(parsed[1].action, Action::Undo);
        assert_eq!(parsed[2].coord, Coord::new(7, 8));
        assert_eq!(parsed[2].action, Action::ModOverwrite);
    }

    #[test]
    fn skips_malformed_rows_without_stopping() {
        let log = "short\trow\n\
t\th\tx\t6\t2\tuser place\n\
t\th\t1\t-6\t2\tuser place\n\
t\th\t1\t6\tred\tuser place\n\
t\th\t1\t6\t2\trollback\n\
t\th\t9\t9\t1\tuser place\textra\n";

        let parsed = events(log);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].coord, Coord::new(9, 9));
        assert_eq!(parsed[0].raw_fields.len(), 7);
    }

    #[test]
    fn action_matches_by_substring() {
        assert_eq!(parse_action(" user place "), Some(Action::Place));
        assert_eq!(parse_action("user undo (rollback)"), Some(Action::Undo));
        assert_eq!(parse_action("mod overwrite"), Some(Action::ModOverwrite));
        assert_eq!(parse_action("user overwrite"), None);
    }

    #[test]
    fn action_reader_ignores_field_shape() {
        let log = "t\th\t5\t5\t\tuser place\n\
t\th\t-1\t5\t2\tuser undo\n\
user place\n\
t\th\t1\t1\t1\trollback\n\
mod overwrite by admin\n";

        let actions: Vec<Action> = ActionReader::new(log.as_bytes()).collect();

        assert_eq!(
            actions,
            vec![Action::Place, Action::Undo, Action::Place, Action::ModOverwrite]
        );
        assert!(ActionReader::open(Path::new("/nonexistent/user.log")).is_err());
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(events("").is_empty());
    }

    #[test]
    fn open_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LogReader::open(&dir.path().join("missing.log")).is_err());
    }
}
