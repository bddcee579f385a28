use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt as _, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _,
};

use crate::geo::Located;
use crate::Error;

// Sample is one recorded position fix.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: u64,
}

impl Sample {
    pub fn new(id: u64, latitude: f64, longitude: f64, altitude: f64, timestamp: u64) -> Self {
        Sample {
            id,
            latitude,
            longitude,
            altitude,
            timestamp,
        }
    }
}

impl Located for Sample {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// The payload a client submits to record a position, before it has been
/// assigned an id.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NewSample {
    pub lat: f64,
    pub lng: f64,
    pub alt: f64,
    pub t: serde_json::Number,
}

impl NewSample {
    /// Checks coordinate ranges and that `t` is a non-negative integer,
    /// returning the timestamp on success. Integral floats such as
    /// `1700000000.0` count as integers.
    pub fn validate(&self) -> crate::Result<u64> {
        check_range("lat", self.lat, -90.0, 90.0)?;
        check_range("lng", self.lng, -180.0, 180.0)?;
        if !self.alt.is_finite() {
            return Err(Error::NotFinite {
                field: "alt",
                value: self.alt,
            });
        }
        whole_seconds(&self.t).ok_or_else(|| Error::BadTimestamp(self.t.to_string()))
    }

    pub fn into_sample(self, id: u64) -> crate::Result<Sample> {
        let timestamp = self.validate()?;
        Ok(Sample::new(id, self.lat, self.lng, self.alt, timestamp))
    }
}

fn whole_seconds(t: &serde_json::Number) -> Option<u64> {
    if let Some(t) = t.as_u64() {
        return Some(t);
    }
    let t = t.as_f64()?;
    // 2^64 is the first f64 past u64::MAX.
    (t.is_finite() && t >= 0.0 && t.fract() == 0.0 && t < u64::MAX as f64).then(|| t as u64)
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> crate::Result<()> {
    if !value.is_finite() {
        return Err(Error::NotFinite { field, value });
    }
    if value < min || value > max {
        return Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Wire encodings a trace can be read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One JSON object per line.
    Json,
    /// Headerless CSV: id,latitude,longitude,altitude,timestamp.
    Csv,
    /// A single JSON array, the shape of an API response body.
    Array,
}

impl Encoding {
    /// Guess the encoding of a stream from its first byte.
    pub fn detect(first: u8) -> Self {
        match first {
            b'{' => Encoding::Json,
            b'[' => Encoding::Array,
            _ => Encoding::Csv,
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" | "ndjson" => Ok(Encoding::Json),
            "csv" => Ok(Encoding::Csv),
            "array" => Ok(Encoding::Array),
            other => Err(Error::UnknownEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Encoding::Json => write!(f, "json"),
            Encoding::Csv => write!(f, "csv"),
            Encoding::Array => write!(f, "array"),
        }
    }
}

// A Codec streams samples one at a time. decode returns None at end of input.
#[async_trait]
pub trait Codec {
    async fn encode<W: AsyncWrite + Unpin + Send>(&self, writer: &mut W, sample: &Sample)
        -> Result<()>;
    async fn decode<R: AsyncBufRead + Unpin + Send>(&self, reader: &mut R)
        -> Result<Option<Sample>>;
}

pub struct JsonCodec;

#[async_trait]
impl Codec for JsonCodec {
    async fn encode<W: AsyncWrite + Unpin + Send>(
        &self,
        writer: &mut W,
        sample: &Sample,
    ) -> Result<()> {
        writer.write_all(&serde_json::to_vec(sample)?).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn decode<R: AsyncBufRead + Unpin + Send>(&self, reader: &mut R) -> Result<Option<Sample>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(None);
            }
            if buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return serde_json::from_slice(&buf)
                .map(Some)
                .map_err(|e| eyre::eyre!(e));
        }
    }
}

pub struct CsvCodec;

#[async_trait]
impl Codec for CsvCodec {
    async fn encode<W: AsyncWrite + Unpin + Send>(
        &self,
        writer: &mut W,
        sample: &Sample,
    ) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.serialize(sample)?;
        let buf = wtr.into_inner().map_err(|e| eyre::eyre!(e.to_string()))?;
        writer.write_all(&buf).await?;
        Ok(())
    }

    async fn decode<R: AsyncBufRead + Unpin + Send>(&self, reader: &mut R) -> Result<Option<Sample>> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            // Skip blank lines and a header row if one was written by hand.
            if trimmed.is_empty() || trimmed.starts_with("id,") {
                continue;
            }
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(trimmed.as_bytes());
            return match rdr.deserialize::<Sample>().next() {
                Some(record) => Ok(Some(record?)),
                None => eyre::bail!("no CSV record in line {:?}", trimmed),
            };
        }
    }
}

/// Read a whole JSON array of samples.
pub async fn read_array<R: AsyncBufRead + Unpin + Send>(reader: &mut R) -> Result<Vec<Sample>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    serde_json::from_slice(&buf).map_err(|e| eyre::eyre!(e))
}

/// Write samples as a single JSON array followed by a newline.
pub async fn write_array<W: AsyncWrite + Unpin + Send>(
    writer: &mut W,
    samples: &[Sample],
) -> Result<()> {
    writer.write_all(&serde_json::to_vec(samples)?).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

/// Read every sample from `reader` in the given encoding.
pub async fn read_samples<R: AsyncBufRead + Unpin + Send>(
    reader: &mut R,
    encoding: Encoding,
) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();
    match encoding {
        Encoding::Array => samples = read_array(reader).await?,
        Encoding::Json => {
            while let Some(sample) = JsonCodec.decode(&mut *reader).await? {
                samples.push(sample);
            }
        }
        Encoding::Csv => {
            while let Some(sample) = CsvCodec.decode(&mut *reader).await? {
                samples.push(sample);
            }
        }
    }
    Ok(samples)
}

/// Write every sample to `writer` in the given encoding and flush.
pub async fn write_samples<W: AsyncWrite + Unpin + Send>(
    writer: &mut W,
    samples: &[Sample],
    encoding: Encoding,
) -> Result<()> {
    match encoding {
        Encoding::Array => write_array(writer, samples).await?,
        Encoding::Json => {
            for sample in samples {
                JsonCodec.encode(&mut *writer, sample).await?;
            }
        }
        Encoding::Csv => {
            for sample in samples {
                CsvCodec.encode(&mut *writer, sample).await?;
            }
        }
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn trace() -> Vec<Sample> {
        vec![
            Sample::new(1, 37.7749, -122.4194, 12.5, 1000),
            Sample::new(2, 37.775, -122.4195, -3.0, 2000),
        ]
    }

    #[tokio::test]
    async fn json_codec_decodes_lines() {
        let input = b"{\"id\":7,\"latitude\":1.5,\"longitude\":-2.25,\"altitude\":0.0,\"timestamp\":42}\n\n" as &[u8];
        let mut reader = BufReader::new(input);
        let sample = JsonCodec.decode(&mut reader).await.unwrap().unwrap();
        assert_eq!(sample, Sample::new(7, 1.5, -2.25, 0.0, 42));
        assert!(JsonCodec.decode(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_codec_rejects_garbage() {
        let mut reader = BufReader::new(b"{not json}\n" as &[u8]);
        assert!(JsonCodec.decode(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn csv_codec_writes_headerless_rows() {
        let mut out = Vec::new();
        CsvCodec
            .encode(&mut out, &Sample::new(3, 10.5, 20.25, 1.0, 99))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3,10.5,20.25,1.0,99\n");
    }

    #[tokio::test]
    async fn csv_codec_skips_header_and_blank_lines() {
        let input = b"id,latitude,longitude,altitude,timestamp\n\n3,10.5,20.25,1.0,99\n" as &[u8];
        let mut reader = BufReader::new(input);
        let sample = CsvCodec.decode(&mut reader).await.unwrap().unwrap();
        assert_eq!(sample, Sample::new(3, 10.5, 20.25, 1.0, 99));
        assert!(CsvCodec.decode(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transcodes_json_to_csv_and_back() {
        let mut csv = Vec::new();
        write_samples(&mut csv, &trace(), Encoding::Csv).await.unwrap();

        let mut reader = BufReader::new(csv.as_slice());
        let decoded = read_samples(&mut reader, Encoding::Csv).await.unwrap();
        assert_eq!(decoded, trace());
    }

    #[tokio::test]
    async fn array_form_is_a_single_json_document() {
        let mut out = Vec::new();
        write_samples(&mut out, &trace(), Encoding::Array).await.unwrap();
        assert_eq!(out[0], b'[');
        assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 1);

        let mut reader = BufReader::new(out.as_slice());
        assert_eq!(read_samples(&mut reader, Encoding::Array).await.unwrap(), trace());
    }

    #[test]
    fn detects_encoding_from_first_byte() {
        assert_eq!(Encoding::detect(b'{'), Encoding::Json);
        assert_eq!(Encoding::detect(b'['), Encoding::Array);
        assert_eq!(Encoding::detect(b'1'), Encoding::Csv);
    }

    #[test]
    fn parses_encoding_names() {
        assert_eq!("ndjson".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("csv".parse::<Encoding>().unwrap(), Encoding::Csv);
        assert_eq!("array".parse::<Encoding>().unwrap(), Encoding::Array);
        assert_eq!(
            "xml".parse::<Encoding>(),
            Err(Error::UnknownEncoding("xml".to_string()))
        );
        assert_eq!(Encoding::Array.to_string(), "array");
    }

    #[test]
    fn new_sample_validation() {
        let ok: NewSample =
            serde_json::from_str(r#"{"lat":37.7749,"lng":-122.4194,"alt":-10.5,"t":1700000000}"#)
                .unwrap();
        assert_eq!(ok.validate(), Ok(1_700_000_000));
        assert_eq!(
            ok.into_sample(5).unwrap(),
            Sample::new(5, 37.7749, -122.4194, -10.5, 1_700_000_000)
        );

        let lat: NewSample = serde_json::from_str(r#"{"lat":91,"lng":0,"alt":0,"t":1}"#).unwrap();
        assert!(matches!(
            lat.validate(),
            Err(Error::OutOfRange { field: "lat", .. })
        ));

        let lng: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":-180.5,"alt":0,"t":1}"#).unwrap();
        assert!(matches!(
            lng.validate(),
            Err(Error::OutOfRange { field: "lng", .. })
        ));

        let negative: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":-1}"#).unwrap();
        assert_eq!(negative.validate(), Err(Error::BadTimestamp("-1".to_string())));

        let fractional: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":1.5}"#).unwrap();
        assert_eq!(
            fractional.validate(),
            Err(Error::BadTimestamp("1.5".to_string()))
        );
    }

    #[test]
    fn integral_float_timestamps_are_valid() {
        let float: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":1700000000.0}"#).unwrap();
        assert_eq!(float.validate(), Ok(1_700_000_000));

        let exponent: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":1e3}"#).unwrap();
        assert_eq!(exponent.validate(), Ok(1000));

        let negative: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":-5.0}"#).unwrap();
        assert!(matches!(negative.validate(), Err(Error::BadTimestamp(_))));

        let huge: NewSample =
            serde_json::from_str(r#"{"lat":0,"lng":0,"alt":0,"t":1e30}"#).unwrap();
        assert!(matches!(huge.validate(), Err(Error::BadTimestamp(_))));
    }

    #[test]
    fn boundary_coordinates_are_valid() {
        let corner: NewSample =
            serde_json::from_str(r#"{"lat":-90,"lng":180,"alt":0,"t":0}"#).unwrap();
        assert_eq!(corner.validate(), Ok(0));
    }
}
