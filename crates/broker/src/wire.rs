// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON framing over an async byte stream.
//!
//! Each envelope is one JSON object per line, terminated by `\n`. Readers
//! tolerate arbitrary chunk boundaries because `tokio::io::BufReader`
//! already buffers partial reads across polls; [`FrameReader::next_envelope`]
//! just keeps asking it for the next line.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::envelope::Envelope;

/// The outcome of parsing one line: either a well-formed envelope, or a
/// reason the line could not be parsed as one.
#[derive(Debug)]
pub enum FrameResult {
    Envelope(Envelope),
    Malformed(String),
}

pub struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: BufReader::new(inner) }
    }

    /// Read and parse the next complete line. Returns `Ok(None)` on EOF,
    /// whether clean or mid-line (an unterminated trailing fragment is
    /// incomplete by definition and is dropped, never parsed).
    pub async fn next_envelope(&mut self) -> std::io::Result<Option<FrameResult>> {
        loop {
            let mut line = Vec::new();
            let n = self.inner.read_until(b'\n', &mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            } else {
                return Ok(None);
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            return Ok(Some(parse_line(&line)));
        }
    }
}

fn parse_line(line: &[u8]) -> FrameResult {
    match serde_json::from_slice::<Envelope>(line) {
        Ok(env) => FrameResult::Envelope(env),
        Err(e) => FrameResult::Malformed(e.to_string()),
    }
}

pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serialize and write one envelope as a single line. Writers never
    /// interleave bytes: each call fully completes before the next begins,
    /// since `&mut self` prevents concurrent calls on one writer.
    pub async fn write_envelope(&mut self, env: &Envelope) -> std::io::Result<()> {
        let mut line =
            serde_json::to_vec(env).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        self.inner.write_all(&line).await
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
