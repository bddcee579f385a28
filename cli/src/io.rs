use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use eyre::Result;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncRead, AsyncWrite, BufReader, BufWriter, ReadBuf};
use tracing::{debug, warn};
use waymark::{Encoding, Sample};

#[derive(Debug)]
pub enum Input {
    Stdin(BufReader<tokio::io::Stdin>),
    File(BufReader<File>),
}

impl Input {
    pub async fn from_filename(name: &str) -> Result<Self> {
        match name {
            "stdin" | "-" => Ok(Input::Stdin(BufReader::new(tokio::io::stdin()))),
            _ => {
                let f = File::open(name)
                    .await
                    .map_err(|e| eyre::eyre!("open {}: {}", name, e))?;
                Ok(Input::File(BufReader::new(f)))
            }
        }
    }

    pub async fn detect_encoding(&mut self) -> Result<Option<Encoding>> {
        detect_encoding(self).await
    }
}

/// Pick an encoding from the first non-whitespace byte, consuming the
/// whitespace before it. None when the input holds nothing else.
pub async fn detect_encoding<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Encoding>> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(None);
        }
        let (skip, found) = match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(i) => (i, Some(Encoding::detect(buf[i]))),
            None => (buf.len(), None),
        };
        reader.consume(skip);
        if found.is_some() {
            return Ok(found);
        }
    }
}

impl AsyncRead for Input {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Input::Stdin(reader) => Pin::new(reader).poll_read(cx, buf),
            Input::File(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}

impl AsyncBufRead for Input {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        match self.get_mut() {
            Input::Stdin(reader) => Pin::new(reader).poll_fill_buf(cx),
            Input::File(reader) => Pin::new(reader).poll_fill_buf(cx),
        }
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        match self.get_mut() {
            Input::Stdin(reader) => Pin::new(reader).consume(amt),
            Input::File(reader) => Pin::new(reader).consume(amt),
        }
    }
}

#[derive(Debug)]
pub enum Output {
    Stdout(BufWriter<tokio::io::Stdout>),
    File(BufWriter<File>),
}

impl Output {
    pub async fn from_filename(name: &str) -> Result<Self> {
        match name {
            "stdout" | "-" => Ok(Output::Stdout(BufWriter::new(tokio::io::stdout()))),
            _ => {
                let f = File::create(name)
                    .await
                    .map_err(|e| eyre::eyre!("create {}: {}", name, e))?;
                Ok(Output::File(BufWriter::new(f)))
            }
        }
    }
}

impl AsyncWrite for Output {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        match self.get_mut() {
            Output::Stdout(writer) => Pin::new(writer).poll_write(cx, buf),
            Output::File(writer) => Pin::new(writer).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            Output::Stdout(writer) => Pin::new(writer).poll_flush(cx),
            Output::File(writer) => Pin::new(writer).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        match self.get_mut() {
            Output::Stdout(writer) => Pin::new(writer).poll_shutdown(cx),
            Output::File(writer) => Pin::new(writer).poll_shutdown(cx),
        }
    }
}

/// Read every sample from the given sources, stdin when empty, detecting
/// each source's encoding on its own.
pub async fn read_sources(files: &[String]) -> Result<Vec<Sample>> {
    let sources: Vec<&str> = if files.is_empty() {
        vec!["stdin"]
    } else {
        files.iter().map(String::as_str).collect()
    };

    let mut samples = Vec::new();
    for source in sources {
        let mut input = Input::from_filename(source).await?;
        let Some(encoding) = input.detect_encoding().await? else {
            warn!(source, "skipping source with no samples");
            continue;
        };
        let decoded = waymark::read_samples(&mut input, encoding)
            .await
            .map_err(|e| eyre::eyre!("decode {} as {}: {}", source, encoding, e))?;
        debug!(source, %encoding, samples = decoded.len(), "read samples");
        samples.extend(decoded);
    }
    Ok(samples)
}
