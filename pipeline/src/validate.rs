use once_cell::sync::Lazy;
use regex::Regex;

/// One to four of `a-z0-9`, never starting with `c` (reserved as the
/// display prefix, as in `c76`).
static CANVAS: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[abd-z0-9][a-z0-9]{0,3}$"));

/// Exactly 512 of `a-z0-9`.
static KEY: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[a-z0-9]{512}$"));
static HAS_LETTER: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"[a-z]"));

pub fn is_valid_canvas(canvas: &str) -> bool {
    matches(&CANVAS, canvas)
}

/// A key must also hold at least one letter.
pub fn is_valid_key(key: &str) -> bool {
    matches(&KEY, key) && matches(&HAS_LETTER, key)
}

fn matches(pattern: &Lazy<Result<Regex, regex::Error>>, text: &str) -> bool {
    Lazy::force(pattern)
        .as_ref()
        .map_or(false, |re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_codes() {
        for ok in ["1", "76", "78a", "13b", "zzzz"] {
            assert!(is_valid_canvas(ok), "{}", ok);
        }
        for bad in ["", "c76", "C76", "76A", "12345", "7 6", "7-6", "é"] {
            assert!(!is_valid_canvas(bad), "{}", bad);
        }
    }

    #[test]
    fn patterns_compile() {
        assert!(CANVAS.is_ok());
        assert!(KEY.is_ok());
        assert!(HAS_LETTER.is_ok());
    }

    #[test]
    fn keys() {
        let good = "a1".repeat(256);
        assert!(is_valid_key(&good));

        assert!(!is_valid_key(&"1".repeat(512)));
        assert!(!is_valid_key(&"a".repeat(511)));
        assert!(!is_valid_key(&"a".repeat(513)));
        assert!(!is_valid_key(&"A".repeat(512)));
        assert!(!is_valid_key(&format!("{}-", "a".repeat(511))));
    }
}
