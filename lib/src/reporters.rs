use std::io::Write;
use std::time::{Duration, UNIX_EPOCH};

use humantime_serde::re::humantime;
use serde::Serialize;
use tabwriter::TabWriter;

use crate::{downsample, Params, Sample, TraceMetrics};

/// A raw trace next to its downsampled form.
#[derive(Debug, Serialize)]
pub struct Report {
    pub params: Params,
    pub raw: TraceMetrics,
    pub downsampled: TraceMetrics,
    /// Fraction of samples dropped, in [0, 1).
    pub reduction: f64,
}

impl Report {
    pub fn new(raw: &[Sample], downsampled: &[Sample], params: Params) -> Self {
        let reduction = if raw.is_empty() {
            0.0
        } else {
            1.0 - downsampled.len() as f64 / raw.len() as f64
        };
        Report {
            params,
            raw: TraceMetrics::from_samples(raw),
            downsampled: TraceMetrics::from_samples(downsampled),
            reduction,
        }
    }

    /// Downsample `raw` with `params` and report on the result.
    pub fn build(raw: &[Sample], params: Params) -> Self {
        let downsampled = downsample(raw, &params);
        Self::new(raw, &downsampled, params)
    }
}

fn rfc3339(secs: u64) -> String {
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(secs)).to_string()
}

pub fn report_text(r: &Report, w: &mut dyn Write) -> eyre::Result<()> {
    let mut tw = TabWriter::new(w);
    let (raw, ds) = (&r.raw, &r.downsampled);

    write!(
        tw,
        "Samples\t[raw, downsampled, reduction]\t{}, {}, {:.2}%\n\
         Time\t[earliest, latest, duration]\t{}, {}, {}\n\
         Distance\t[raw, downsampled]\t{:.2}m, {:.2}m\n\
         Speed\t[raw, downsampled]\t{:.2}m/s, {:.2}m/s\n\
         Altitude\t[min, max, gain]\t{:.2}m, {:.2}m, {:.2}m\n",
        raw.samples,
        ds.samples,
        r.reduction * 100.0,
        rfc3339(raw.earliest),
        rfc3339(raw.latest),
        humantime::format_duration(raw.duration),
        raw.distance,
        ds.distance,
        raw.speed,
        ds.speed,
        raw.altitude.min,
        raw.altitude.max,
        raw.altitude.gain,
    )?;

    if let Some(b) = raw.bounds {
        writeln!(
            tw,
            "Bounds\t[min lat, min lng, max lat, max lng]\t{:.6}, {:.6}, {:.6}, {:.6}",
            b.min_lat, b.min_lng, b.max_lat, b.max_lng
        )?;
    }

    writeln!(
        tw,
        "Params\t[minDist, windowSize, splitThreshold]\t{}m, {}, {}",
        r.params.min_dist, r.params.window_size, r.params.split_threshold
    )?;

    tw.flush()?;
    Ok(())
}

pub fn report_json(r: &Report, w: &mut dyn Write) -> eyre::Result<()> {
    serde_json::to_writer(&mut *w, r)?;
    w.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> Vec<Sample> {
        vec![
            Sample::new(1, 37.7749, -122.4194, 0.0, 1_672_531_200),
            Sample::new(2, 37.7749, -122.4194, 0.0, 1_672_531_260),
            Sample::new(3, 37.7749, -122.4194, 0.0, 1_672_531_320),
            Sample::new(4, 34.0522, -118.2437, 0.0, 1_672_534_800),
        ]
    }

    #[test]
    fn reduction_ratio() {
        let r = Report::build(&trace(), Params::default());
        assert_eq!(r.downsampled.samples, 2);
        assert_eq!(r.reduction, 0.5);

        let empty = Report::build(&[], Params::default());
        assert_eq!(empty.reduction, 0.0);
    }

    #[test]
    fn text_report() {
        let r = Report::build(&trace(), Params::default());
        let mut buf = Vec::new();
        report_text(&r, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("4, 2, 50.00%"), "{}", text);
        assert!(text.contains("2023-01-01T00:00:00Z, 2023-01-01T01:00:00Z, 1h"), "{}", text);
        assert!(text.contains("20m, 5, 0.2"), "{}", text);
        assert!(text.lines().next().unwrap().starts_with("Samples"));
        assert!(text.contains("Bounds"));
    }

    #[test]
    fn text_report_omits_bounds_of_empty_trace() {
        let r = Report::build(&[], Params::default());
        let mut buf = Vec::new();
        report_text(&r, &mut buf).unwrap();
        assert!(!String::from_utf8(buf).unwrap().contains("Bounds"));
    }

    #[test]
    fn json_report() {
        let r = Report::build(&trace(), Params::new(50.0, 3, 0.5));
        let mut buf = Vec::new();
        report_json(&r, &mut buf).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));

        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["raw"]["samples"], 4);
        assert_eq!(v["downsampled"]["samples"], 2);
        assert_eq!(v["raw"]["duration"], "1h");
        assert_eq!(v["params"]["min_dist"], 50.0);
        assert!(v["raw"].get("last").is_none());
    }
}
