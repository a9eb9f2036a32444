//! Decoding of the daemon's multiplexed log stream.
//!
//! Each frame is an 8-byte header followed by its payload:
//! `[stream, 0, 0, 0, size (u32 big-endian)]`, stream 1 = stdout, 2 = stderr.

use serde::Serialize;

const HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    fn from_header(byte: u8) -> Self {
        if byte == 2 {
            LogStream::Stderr
        } else {
            LogStream::Stdout
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub stream: LogStream,
    pub message: String,
}

/// Split a multiplexed buffer into lines. A truncated trailing frame ends
/// decoding; whatever complete frames preceded it are returned.
#[must_use]
pub fn demux(buf: &[u8]) -> Vec<LogLine> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while buf.len() - offset >= HEADER_LEN {
        let header = &buf[offset..offset + HEADER_LEN];
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = offset + HEADER_LEN;
        if buf.len() - start < size {
            break;
        }

        let message = String::from_utf8_lossy(&buf[start..start + size]);
        let message = message.trim();
        if !message.is_empty() {
            lines.push(LogLine {
                stream: LogStream::from_header(header[0]),
                message: message.to_string(),
            });
        }
        offset = start + size;
    }

    lines
}

/// Logs of a TTY container are not multiplexed; every line is stdout.
#[must_use]
pub fn plain_lines(buf: &[u8]) -> Vec<LogLine> {
    String::from_utf8_lossy(buf)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| LogLine {
            stream: LogStream::Stdout,
            message: l.to_string(),
        })
        .collect()
}
