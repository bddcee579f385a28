use clap::Args;
use eyre::Result;
use tokio::io::AsyncWriteExt;
use waymark::{Params, Report};

use crate::downsample::ParamsOpts;
use crate::io::{read_sources, Output};

#[derive(Args, Debug)]
pub struct Opts {
    #[clap(flatten)]
    pub params: ParamsOpts,

    /// Report type (text, json)
    #[clap(long = "type", default_value = "text")]
    pub report_type: String,

    /// Output file [default: stdout]
    #[clap(long, default_value = "stdout")]
    pub output: String,

    /// Input files [default: stdin]
    pub files: Vec<String>,
}

pub async fn report(opts: &Opts) -> Result<()> {
    let params = opts.params.resolve(Params::default())?;
    let samples = read_sources(&opts.files).await?;
    let report = Report::build(&samples, params);

    let mut buf = Vec::new();
    match opts.report_type.as_str() {
        "text" => waymark::report_text(&report, &mut buf)?,
        "json" => waymark::report_json(&report, &mut buf)?,
        other => eyre::bail!("unknown report type: {}", other),
    }

    let mut output = Output::from_filename(&opts.output).await?;
    output.write_all(&buf).await?;
    output.flush().await?;
    Ok(())
}
