use std::io::{self, Read};

use indicatif::{ProgressBar, ProgressStyle};

/// Wraps a Read and updates a ProgressBar as bytes are read.
pub struct ProgressReader<R: Read> {
    inner: R,
    progress: ProgressBar,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: ProgressBar) -> Self {
        Self { inner, progress }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes_read = self.inner.read(buf)?;
        self.progress.inc(bytes_read as u64);
        Ok(bytes_read)
    }
}

/// Standard transfer bar: bytes, throughput, ETA.
pub fn transfer_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:30.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_reader_counts_bytes() {
        let data = vec![7u8; 1024];
        let bar = ProgressBar::hidden();
        let mut reader = ProgressReader::new(std::io::Cursor::new(data), bar.clone());

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 1024);
        assert_eq!(bar.position(), 1024);
    }
}
