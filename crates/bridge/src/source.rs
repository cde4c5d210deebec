//! Raw meter line sources

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Where meter lines are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSource {
    Stdin,
    /// Serial device (or any file) opened for reading
    Device(PathBuf),
}

impl LineSource {
    /// `-` selects stdin, anything else is a device path
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            LineSource::Stdin
        } else {
            LineSource::Device(PathBuf::from(raw))
        }
    }

    /// Whether end of input should reopen the source rather than exit
    pub fn reconnects(&self) -> bool {
        matches!(self, LineSource::Device(_))
    }

    pub async fn open(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
        match self {
            LineSource::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
            LineSource::Device(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSource::Stdin => f.write_str("stdin"),
            LineSource::Device(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Decode raw bytes, dropping invalid UTF-8 and surrounding whitespace
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Next non-blank line, or `None` at end of input
pub async fn next_line<R: AsyncBufRead + Unpin + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Result<Option<String>> {
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', buf)
            .await
            .context("Failed to read meter line")?;
        if read == 0 {
            return Ok(None);
        }
        let line = decode_line(buf);
        if !line.is_empty() {
            return Ok(Some(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(LineSource::parse("-"), LineSource::Stdin);
        assert_eq!(
            LineSource::parse("/dev/ttyUSB0"),
            LineSource::Device(PathBuf::from("/dev/ttyUSB0"))
        );
        assert!(!LineSource::Stdin.reconnects());
        assert!(LineSource::parse("/dev/ttyACM0").reconnects());
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode_line(b"L1:230V 1A 230W\r\n"), "L1:230V 1A 230W");
        assert_eq!(decode_line(b"Ene\xffrgy: 5.2kWh"), "Energy: 5.2kWh");
        assert_eq!(decode_line(b"\xfe\xff  \n"), "");
    }

    #[tokio::test]
    async fn test_next_line_skips_blanks() {
        let mut reader: &[u8] = b"\n\r\nL1:230V 1A 230W\n  \nCost: 4";
        let mut buf = Vec::new();
        assert_eq!(
            next_line(&mut reader, &mut buf).await.unwrap().as_deref(),
            Some("L1:230V 1A 230W")
        );
        assert_eq!(
            next_line(&mut reader, &mut buf).await.unwrap().as_deref(),
            Some("Cost: 4")
        );
        assert_eq!(next_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = LineSource::Device(dir.path().join("ttyUSB9"));
        assert!(source.open().await.is_err());
    }
}
