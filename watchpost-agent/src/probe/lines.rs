//! Streaming line counter for command output

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Counts newline-delimited lines read through a fixed-size buffer.
///
/// Lines split across buffer reads are reassembled before the predicate
/// sees them, and a trailing line without `\n` still counts.
#[derive(Debug, Clone, Copy)]
pub struct LineCounter {
    buffer_size: usize,
}

impl Default for LineCounter {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl LineCounter {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub async fn count<R>(&self, reader: R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.count_matching(reader, |_| true).await
    }

    /// Count only the lines accepted by `accept` (line passed without `\n`)
    pub async fn count_matching<R, F>(&self, mut reader: R, mut accept: F) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
        F: FnMut(&[u8]) -> bool,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut pending: Vec<u8> = Vec::new();
        let mut count = 0;

        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                break;
            }

            let mut chunk = &buf[..read];
            while let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
                let line = if pending.is_empty() {
                    &chunk[..pos]
                } else {
                    pending.extend_from_slice(&chunk[..pos]);
                    pending.as_slice()
                };
                if accept(line) {
                    count += 1;
                }
                pending.clear();
                chunk = &chunk[pos + 1..];
            }
            pending.extend_from_slice(chunk);
        }

        if !pending.is_empty() && accept(&pending) {
            count += 1;
        }

        Ok(count)
    }
}

pub async fn count_lines<R>(reader: R) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    LineCounter::default().count(reader).await
}
