use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use image::Rgb;
use tracing::debug;

use crate::errors::ReaderError;

const HEADER_MARKERS: [&str; 4] = ["GIMP", "Name", "Columns", "#"];

/// Indexed colors of a canvas, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb<u8>>) -> Self {
        Self { colors }
    }

    /// Decodes a GIMP `.gpl` palette file.
    pub fn decode(path: &Path) -> Result<Palette, ReaderError> {
        let file = File::open(path).map_err(|err| ReaderError::io(path, err))?;
        let palette =
            Self::from_reader(BufReader::new(file)).map_err(|err| ReaderError::io(path, err))?;

        debug!(path = %path.display(), colors = palette.len(), "decoded palette");

        Ok(palette)
    }

    /// Header and comment lines are skipped, as are lines without three
    /// leading integers. Components outside 0-255 are clamped rather than
    /// dropped, so later indices keep their place.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Palette> {
        let mut colors = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if HEADER_MARKERS.iter().any(|marker| line.starts_with(marker)) {
                continue;
            }

            let mut parts = line.split_whitespace().map(parse_component);
            if let (Some(Some(r)), Some(Some(g)), Some(Some(b))) =
                (parts.next(), parts.next(), parts.next())
            {
                colors.push(Rgb([r, g, b]));
            }
        }

        Ok(Palette { colors })
    }

    pub fn get(&self, index: u32) -> Option<Rgb<u8>> {
        self.colors.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }
}

fn parse_component(text: &str) -> Option<u8> {
    let value = text.parse::<i64>().ok()?;
    Some(value.clamp(0, u8::MAX as i64) as u8)
}

/// Decoded palettes keyed by file path.
///
/// Two callers missing on the same path at once both decode it; the second
/// insert replaces an identical value.
#[derive(Debug, Default)]
pub struct PaletteCache {
    palettes: RwLock<HashMap<PathBuf, Arc<Palette>>>,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_decode(&self, path: &Path) -> Result<Arc<Palette>, ReaderError> {
        {
            let palettes = self.palettes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(palette) = palettes.get(path) {
                return Ok(Arc::clone(palette));
            }
        }

        let palette = Arc::new(Palette::decode(path)?);

        self.palettes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::clone(&palette));

        Ok(palette)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;

    use super::*;

    const GPL: &str = "GIMP Palette\n\
Name: pxls\n\
Columns: 4\n\
# comment 1 2 3\n\
255 255 255\tWhite\n\
0 0 0 Black\n\
\n\
not a color\n\
12 34\n\
300 0 0 too bright\n\
255 0 0\tRed\n";

    #[test]
    fn skips_headers_comments_and_short_lines() {
        let palette = Palette::from_reader(Cursor::new(GPL)).unwrap();

        assert_eq!(
            palette.colors(),
            &[
                Rgb([255, 255, 255]),
                Rgb([0, 0, 0]),
                Rgb([255, 0, 0]),
                Rgb([255, 0, 0])
            ]
        );
        assert_eq!(palette.get(3), Some(Rgb([255, 0, 0])));
        assert_eq!(palette.get(4), None);
    }

    #[test]
    fn out_of_range_components_keep_indices_aligned() {
        let gpl = "GIMP Palette\n0 0 0\n256 -4 999\n10 20 30\n";

        let palette = Palette::from_reader(Cursor::new(gpl)).unwrap();

        assert_eq!(palette.len(), 3);
        assert_eq!(palette.get(1), Some(Rgb([255, 0, 255])));
        assert_eq!(palette.get(2), Some(Rgb([10, 20, 30])));
    }

    #[test]
    fn decoding_twice_yields_same_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette_1.gpl");
        std::fs::write(&path, GPL).unwrap();

        let first = Palette::decode(&path).unwrap();
        let second = Palette::decode(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Palette::decode(&dir.path().join("nope.gpl")).unwrap_err();

        assert!(err.to_string().contains("nope.gpl"));
    }

    #[test]
    fn cache_decodes_once_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette_1.gpl");
        std::fs::write(&path, GPL).unwrap();

        let cache = PaletteCache::new();
        let first = cache.get_or_decode(&path).unwrap();

        // Later edits are not seen; palettes are static per canvas.
        std::fs::write(&path, "1 2 3\n").unwrap();
        let second = cache.get_or_decode(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.palettes.read().unwrap().len(), 1);
    }

    #[test]
    fn cache_survives_concurrent_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette_1.gpl");
        std::fs::write(&path, GPL).unwrap();

        let cache = PaletteCache::new();

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let palette = cache.get_or_decode(&path).unwrap();
                    assert_eq!(palette.len(), 4);
                });
            }
        });

        assert_eq!(cache.palettes.read().unwrap().len(), 1);
    }
}
