mod errors;
mod log_reader;
mod palette;

pub use crate::errors::ReaderError;
pub use crate::log_reader::{parse_row, ActionReader, LogReader};
pub use crate::palette::{Palette, PaletteCache};
