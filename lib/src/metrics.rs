use std::time::Duration;

use serde::Serialize;

use crate::geo::distance;
use crate::query::BoundingBox;
use crate::Sample;

/// Summary of a trace, accumulated sample by sample.
#[derive(Debug, Default, Serialize)]
pub struct TraceMetrics {
    pub samples: u64,
    pub earliest: u64,
    pub latest: u64,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Path length in meters along consecutive samples.
    pub distance: f64,
    /// Mean speed in meters per second over the whole duration.
    pub speed: f64,
    pub altitude: AltitudeMetrics,
    pub bounds: Option<BoundingBox>,
    #[serde(skip)]
    last: Option<(f64, f64)>,
}

#[derive(Debug, Default, Serialize)]
pub struct AltitudeMetrics {
    pub min: f64,
    pub max: f64,
    /// Sum of positive altitude deltas between consecutive samples.
    pub gain: f64,
    #[serde(skip)]
    last: Option<f64>,
}

impl TraceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut m = Self::new();
        for s in samples {
            m.add(s);
        }
        m.close();
        m
    }

    pub fn add(&mut self, s: &Sample) {
        if self.samples == 0 || s.timestamp < self.earliest {
            self.earliest = s.timestamp;
        }
        if s.timestamp > self.latest {
            self.latest = s.timestamp;
        }

        if let Some((lat, lng)) = self.last {
            self.distance += distance(lat, lng, s.latitude, s.longitude);
        }
        self.last = Some((s.latitude, s.longitude));

        let alt = &mut self.altitude;
        match alt.last {
            None => {
                alt.min = s.altitude;
                alt.max = s.altitude;
            }
            Some(prev) => {
                alt.min = alt.min.min(s.altitude);
                alt.max = alt.max.max(s.altitude);
                if s.altitude > prev {
                    alt.gain += s.altitude - prev;
                }
            }
        }
        alt.last = Some(s.altitude);

        self.bounds = Some(match self.bounds {
            None => BoundingBox {
                min_lat: s.latitude,
                min_lng: s.longitude,
                max_lat: s.latitude,
                max_lng: s.longitude,
            },
            Some(b) => BoundingBox {
                min_lat: b.min_lat.min(s.latitude),
                min_lng: b.min_lng.min(s.longitude),
                max_lat: b.max_lat.max(s.latitude),
                max_lng: b.max_lng.max(s.longitude),
            },
        });

        self.samples += 1;
    }

    pub fn close(&mut self) {
        if self.samples == 0 {
            return;
        }

        self.duration = Duration::from_secs(self.latest.saturating_sub(self.earliest));

        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.speed = self.distance / secs;
        }
    }
}
