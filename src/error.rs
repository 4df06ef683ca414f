use std::path::PathBuf;

use thiserror::Error;

/// Why an image never became drawable.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes were read but did not decode as a supported image.
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Decoded to zero width or height.
    #[error("{} has no pixels", .0.display())]
    EmptyImage(PathBuf),

    /// The worker went away without publishing a result.
    #[error("load of {} was abandoned", .0.display())]
    Abandoned(PathBuf),
}
