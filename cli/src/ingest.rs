use clap::Args;
use eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use waymark::{Encoding, NewSample, Sample};

use crate::io::{Input, Output};

#[derive(Args, Debug)]
pub struct Opts {
    /// Id assigned to the earliest valid fix
    #[clap(long, default_value_t = 1)]
    pub first_id: u64,

    /// Fail on the first invalid fix instead of skipping it
    #[clap(long, default_value_t = false)]
    pub strict: bool,

    /// Output encoding (json, csv, array)
    #[clap(long, default_value = "json")]
    pub to: Encoding,

    /// Output file [default: stdout]
    #[clap(long, default_value = "stdout")]
    pub output: String,

    /// Input files of newline-delimited {"lat","lng","alt","t"} objects [default: stdin]
    pub files: Vec<String>,
}

pub async fn ingest(opts: &Opts) -> Result<()> {
    let sources: Vec<String> = if opts.files.is_empty() {
        vec!["stdin".to_string()]
    } else {
        opts.files.clone()
    };

    let mut fixes: Vec<(u64, NewSample)> = Vec::new();
    let mut rejected = 0usize;

    for source in &sources {
        let mut input = Input::from_filename(source).await?;
        rejected += read_fixes(&mut input, source, opts.strict, &mut fixes).await?;
    }

    let samples = assign_ids(fixes, opts.first_id)?;
    info!(accepted = samples.len(), rejected, "ingested");

    let mut output = Output::from_filename(&opts.output).await?;
    waymark::write_samples(&mut output, &samples, opts.to).await
}

// Returns how many lines were skipped. Lines are read as bytes so that
// invalid UTF-8 is rejected like any other malformed fix.
async fn read_fixes<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    source: &str,
    strict: bool,
    fixes: &mut Vec<(u64, NewSample)>,
) -> Result<usize> {
    let mut line = Vec::new();
    let mut lineno = 0usize;
    let mut rejected = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        lineno += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let checked = serde_json::from_slice::<NewSample>(&line)
            .map_err(|e| eyre::eyre!(e))
            .and_then(|fix| Ok((fix.validate()?, fix)));
        match checked {
            Ok(fix) => fixes.push(fix),
            Err(e) if strict => eyre::bail!("{}:{}: {}", source, lineno, e),
            Err(e) => {
                warn!(source, line = lineno, error = %e, "skipping invalid fix");
                rejected += 1;
            }
        }
    }
    Ok(rejected)
}

// Ids follow time so they agree with timestamp order.
fn assign_ids(mut fixes: Vec<(u64, NewSample)>, first_id: u64) -> Result<Vec<Sample>> {
    if let Some(last) = (fixes.len() as u64).checked_sub(1) {
        eyre::ensure!(
            first_id.checked_add(last).is_some(),
            "--first-id {} leaves no room for {} fixes",
            first_id,
            fixes.len()
        );
    }

    fixes.sort_by_key(|(t, _)| *t);
    Ok(fixes
        .into_iter()
        .enumerate()
        .map(|(i, (t, fix))| Sample::new(first_id + i as u64, fix.lat, fix.lng, fix.alt, t))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn fix(t: u64) -> (u64, NewSample) {
        let json = format!(r#"{{"lat":1.0,"lng":2.0,"alt":0.0,"t":{}}}"#, t);
        let fix: NewSample = serde_json::from_str(&json).unwrap();
        (t, fix)
    }

    #[tokio::test]
    async fn invalid_utf8_is_skipped_when_lenient() {
        let input = b"{\"lat\":1,\"lng\":2,\"alt\":0,\"t\":5}\n\xff\xfe\n\n{\"lat\":91,\"lng\":0,\"alt\":0,\"t\":1}\n" as &[u8];
        let mut fixes = Vec::new();
        let rejected = read_fixes(&mut BufReader::new(input), "test", false, &mut fixes)
            .await
            .unwrap();
        assert_eq!(rejected, 2);
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].0, 5);
    }

    #[tokio::test]
    async fn invalid_utf8_fails_when_strict() {
        let input = b"\xff\xfe\n" as &[u8];
        let mut fixes = Vec::new();
        let err = read_fixes(&mut BufReader::new(input), "test", true, &mut fixes)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("test:1:"));
    }

    #[test]
    fn ids_follow_time_order() {
        let samples = assign_ids(vec![fix(30), fix(10), fix(20)], 7).unwrap();
        let ids: Vec<(u64, u64)> = samples.iter().map(|s| (s.id, s.timestamp)).collect();
        assert_eq!(ids, [(7, 10), (8, 20), (9, 30)]);
    }

    #[test]
    fn first_id_near_the_top_of_the_range() {
        let one = assign_ids(vec![fix(1)], u64::MAX).unwrap();
        assert_eq!(one[0].id, u64::MAX);

        assert!(assign_ids(vec![fix(1), fix(2)], u64::MAX).is_err());
        assert!(assign_ids(Vec::new(), u64::MAX).unwrap().is_empty());
    }
}
