use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("not a readable image: {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },
}

impl PhotoError {
    pub(crate) fn invalid_image(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PhotoError::InvalidImage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no output driver for format \"{0}\"")]
    UnsupportedFormat(String),
    #[error("found no jpeg files")]
    NoInputFound,
    #[error("found {found} jpeg files, but none had GPS information")]
    NoGeolocatedInput { found: usize },
    #[error("failed to set spatial reference system with EPSG {epsg}: {reason}")]
    InvalidReferenceSystem { epsg: u32, reason: String },
    #[error("could not remove existing output {path}: {source}")]
    OverwriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("creating point layer \"{layer}\" failed: {reason}")]
    LayerCreationFailed { layer: String, reason: String },
    #[error("creating field {field} failed: {reason}")]
    FieldCreationFailed { field: String, reason: String },
    #[error("reprojecting {path} from EPSG {from} to EPSG {to} failed: {reason}")]
    ReprojectionFailed {
        path: PathBuf,
        from: u16,
        to: u16,
        reason: String,
    },
    #[error("writing to {path} failed: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}
