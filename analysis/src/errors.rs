use std::path::PathBuf;

use reader::ReaderError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("could not load image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not list templates in {}: {source}", .path.display())]
    TemplateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("palette has no colors")]
    EmptyPalette,
}
