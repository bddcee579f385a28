use std::time::Instant;

use clap::Args;
use eyre::Result;
use tracing::{info, warn};
use waymark::query::parse_timestamp;
use waymark::{BoundingBox, Encoding, Params, Query, TimeRange};

use crate::io::{read_sources, Output};

/// Engine parameters shared by every subcommand that downsamples.
#[derive(Args, Debug)]
pub struct ParamsOpts {
    /// Distance in meters under which samples merge [0 disables merging]
    #[clap(long, env = "WAYMARK_MIN_DIST")]
    pub min_dist: Option<f64>,

    /// Samples examined before deciding that a far sample starts a new cluster
    #[clap(long, env = "WAYMARK_WINDOW_SIZE")]
    pub window_size: Option<usize>,

    /// Fraction of the window that must also be far to split [0-1]
    #[clap(long, env = "WAYMARK_SPLIT_THRESHOLD")]
    pub split_threshold: Option<f64>,
}

impl ParamsOpts {
    /// Flags override `base`; the result must be in range.
    pub fn resolve(&self, base: Params) -> Result<Params> {
        let params = Params {
            min_dist: self.min_dist.unwrap_or(base.min_dist),
            window_size: self.window_size.unwrap_or(base.window_size),
            split_threshold: self.split_threshold.unwrap_or(base.split_threshold),
        };
        params.validate()?;
        Ok(params)
    }
}

#[derive(Args, Debug)]
pub struct Opts {
    #[clap(flatten)]
    pub params: ParamsOpts,

    /// URL query string, e.g. "minDist=50&start=2024-01-01T00:00:00Z&limit=5000"
    #[clap(long, default_value = "")]
    pub query: String,

    /// Earliest timestamp (epoch seconds or RFC 3339)
    #[clap(long, value_parser = parse_timestamp)]
    pub start: Option<u64>,

    /// Latest timestamp (epoch seconds or RFC 3339)
    #[clap(long, value_parser = parse_timestamp)]
    pub end: Option<u64>,

    /// Bounding box "minLng,minLat,maxLng,maxLat"
    #[clap(long)]
    pub bbox: Option<BoundingBox>,

    /// Maximum number of samples fed to the engine
    #[clap(long)]
    pub limit: Option<usize>,

    /// Earliest timestamp the caller is allowed to see
    #[clap(long, value_parser = parse_timestamp)]
    pub allowed_start: Option<u64>,

    /// Latest timestamp the caller is allowed to see
    #[clap(long, value_parser = parse_timestamp)]
    pub allowed_end: Option<u64>,

    /// Output encoding (json, csv, array)
    #[clap(long, default_value = "array")]
    pub to: Encoding,

    /// Output file [default: stdout]
    #[clap(long, default_value = "stdout")]
    pub output: String,

    /// Input files [default: stdin]
    pub files: Vec<String>,
}

impl Opts {
    /// Combine the query string with flags; flags win.
    pub fn query(&self) -> Result<Query> {
        let mut q = Query::from_query_str(&self.query)?;
        q.params = self.params.resolve(q.params)?;
        if self.start.is_some() || self.end.is_some() {
            q.range = TimeRange::new(self.start.or(q.range.start), self.end.or(q.range.end))?;
        }
        if self.bbox.is_some() {
            q.bbox = self.bbox;
        }
        if let Some(limit) = self.limit {
            eyre::ensure!(limit > 0, "--limit must be positive");
            q.limit = Some(limit);
        }
        Ok(q)
    }

    pub fn allowed(&self) -> Result<TimeRange> {
        Ok(TimeRange::new(self.allowed_start, self.allowed_end)?)
    }
}

pub async fn downsample(opts: &Opts) -> Result<()> {
    let query = opts.query()?;
    let allowed = opts.allowed()?;
    let params = query.params;
    let requested = query.range;

    let samples = read_sources(&opts.files).await?;
    let selected = match query.narrow_to(&allowed) {
        Some(query) => query.apply(&samples),
        None => {
            warn!(?requested, ?allowed, "requested range is outside the allowed window");
            Vec::new()
        }
    };

    let began = Instant::now();
    let representatives = waymark::downsample(&selected, &params);

    info!(
        read = samples.len(),
        selected = selected.len(),
        representatives = representatives.len(),
        elapsed = ?began.elapsed(),
        %params,
        "downsampled"
    );

    let mut output = Output::from_filename(&opts.output).await?;
    waymark::write_samples(&mut output, &representatives, opts.to).await
}
