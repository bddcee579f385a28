use std::borrow::Cow;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cluster::{Params, DEFAULT_MIN_DIST, DEFAULT_SPLIT_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::{Error, Result, Sample};

/// Inclusive range of epoch seconds. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl TimeRange {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::InvertedRange { start, end });
            }
        }
        Ok(TimeRange { start, end })
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }

    /// Restrict this range to the part that also lies within `allowed`.
    /// Returns None when the two don't overlap.
    pub fn narrow(&self, allowed: &TimeRange) -> Option<TimeRange> {
        let start = match (self.start, allowed.start) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let end = match (self.end, allowed.end) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        TimeRange::new(start, end).ok()
    }
}

/// Parse a timestamp given either as integer epoch seconds or as an
/// RFC 3339 date-time.
pub fn parse_timestamp(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_rfc3339_weak(s)
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .ok_or_else(|| Error::BadTimestamp(s.to_string()))
}

/// Inclusive latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

// Parsed from "minLng,minLat,maxLng,maxLat".
impl FromStr for BoundingBox {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let bad = || Error::BadBoundingBox(s.to_string());

        let coords = s
            .split(',')
            .map(|c| c.trim().parse::<f64>().map_err(|_| bad()))
            .collect::<Result<Vec<_>>>()?;
        let [min_lng, min_lat, max_lng, max_lat] = coords[..] else {
            return Err(bad());
        };

        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lng_ok = |v: f64| (-180.0..=180.0).contains(&v);
        if !(lat_ok(min_lat) && lat_ok(max_lat) && lng_ok(min_lng) && lng_ok(max_lng))
            || min_lat > max_lat
            || min_lng > max_lng
        {
            return Err(bad());
        }

        Ok(BoundingBox {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        })
    }
}

/// What a caller asks for: which part of the trace, how many samples at
/// most, and how to downsample it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub range: TimeRange,
    pub bbox: Option<BoundingBox>,
    pub limit: Option<usize>,
    pub params: Params,
}

impl Query {
    pub fn from_url(url: &Url) -> Result<Self> {
        Self::from_pairs(url.query_pairs())
    }

    /// Parse a URL query string such as `minDist=50&start=1700000000`.
    /// A leading `?` is accepted.
    pub fn from_query_str(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    // Downsampling parameters fall back to their defaults when malformed or
    // out of range. Range, bbox and limit are rejected instead.
    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Result<Self> {
        let mut q = Query::default();
        let (mut start, mut end) = (None, None);

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_ref() {
                "minDist" => {
                    q.params.min_dist = value
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .unwrap_or(DEFAULT_MIN_DIST);
                }
                "windowSize" => {
                    q.params.window_size = value
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v >= 1)
                        .unwrap_or(DEFAULT_WINDOW_SIZE);
                }
                "splitThreshold" => {
                    q.params.split_threshold = value
                        .parse::<f64>()
                        .ok()
                        .filter(|v| (0.0..=1.0).contains(v))
                        .unwrap_or(DEFAULT_SPLIT_THRESHOLD);
                }
                "start" => start = Some(parse_timestamp(value)?),
                "end" => end = Some(parse_timestamp(value)?),
                "bbox" => q.bbox = Some(value.parse()?),
                "limit" => {
                    let limit = value
                        .parse::<usize>()
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| Error::BadParam {
                            name: "limit",
                            value: value.to_string(),
                        })?;
                    q.limit = Some(limit);
                }
                _ => {}
            }
        }

        q.range = TimeRange::new(start, end)?;
        Ok(q)
    }

    /// Restrict the query's time range to `allowed`. None means nothing the
    /// caller asked for is allowed.
    pub fn narrow_to(mut self, allowed: &TimeRange) -> Option<Self> {
        self.range = self.range.narrow(allowed)?;
        Some(self)
    }

    /// Select the samples matching the query, keeping their order.
    pub fn apply(&self, samples: &[Sample]) -> Vec<Sample> {
        samples
            .iter()
            .filter(|s| self.range.contains(s.timestamp))
            .filter(|s| {
                self.bbox
                    .map_or(true, |b| b.contains(s.latitude, s.longitude))
            })
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
