use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// Error covers everything the layers around the downsampling engine can
// reject. The engine itself never fails.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("timestamp must be a non-negative integer, got {0}")]
    BadTimestamp(String),

    #[error("bad time range: start {start} is after end {end}")]
    InvertedRange { start: u64, end: u64 },

    #[error("bad bounding box {0:?}: expected minLng,minLat,maxLng,maxLat")]
    BadBoundingBox(String),

    #[error("bad {name}: {value:?}")]
    BadParam { name: &'static str, value: String },

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}
