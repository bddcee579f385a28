use clap::Args;
use eyre::Result;
use waymark::Encoding;

use crate::io::{read_sources, Output};

#[derive(Args, Debug)]
pub struct Opts {
    /// Output encoding (json, csv, array)
    #[clap(long, default_value = "json")]
    pub to: Encoding,

    /// Output file [default: stdout]
    #[clap(long, default_value = "stdout")]
    pub output: String,

    /// Input files [default: stdin]
    pub files: Vec<String>,
}

pub async fn encode(opts: &Opts) -> Result<()> {
    let samples = read_sources(&opts.files).await?;
    let mut output = Output::from_filename(&opts.output).await?;
    waymark::write_samples(&mut output, &samples, opts.to).await
}
