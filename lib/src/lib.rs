pub mod cluster;
mod error;
pub mod geo;
mod metrics;
pub mod query;
mod reporters;
mod sample;

pub use cluster::{downsample, Params};
pub use error::{Error, Result};
pub use geo::{distance, Located};
pub use metrics::*;
pub use query::{BoundingBox, Query, TimeRange};
pub use reporters::*;
pub use sample::*;
