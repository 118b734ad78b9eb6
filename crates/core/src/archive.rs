use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    time::Duration,
};

use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use tokio::io::AsyncWriteExt;

use crate::{error::FetchError, types::HourId};

/// Where hourly archives come from
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetch and fully decompress one hour. Lines are returned in file order.
    async fn fetch(&self, hour: &HourId) -> Result<Vec<String>, FetchError>;

    /// Human readable location of an hour, used in logs and progress output
    fn locate(&self, hour: &HourId) -> String {
        hour.file_name()
    }
}

/// `<base_url>/<YYYY-MM-DD>-<H>.json.gz`
pub fn archive_url(base_url: &str, hour: &HourId) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), hour.file_name())
}

/// Decompress a (possibly multi-member) gzip stream of NDJSON into its non-blank lines
pub fn decode_archive<R: Read>(reader: R) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(MultiGzDecoder::new(reader));
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Downloads archives over HTTP, spooling each body through an anonymous temp file
pub struct HttpArchive {
    base_url: String,
    client: reqwest::Client,
}

impl HttpArchive {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn download(&self, url: &str) -> Result<File, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        // Unlinked on creation; the OS reclaims it when the handle drops
        let spool = tempfile::tempfile().map_err(io_err)?;
        let mut spool = tokio::fs::File::from_std(spool);
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            spool.write_all(&chunk).await.map_err(io_err)?;
        }
        spool.flush().await.map_err(io_err)?;

        Ok(spool.into_std().await)
    }
}

#[async_trait]
impl ArchiveSource for HttpArchive {
    async fn fetch(&self, hour: &HourId) -> Result<Vec<String>, FetchError> {
        let url = archive_url(&self.base_url, hour);
        tracing::debug!(%url, "downloading archive");
        let mut spool = self.download(&url).await?;

        let decoded = tokio::task::spawn_blocking(move || {
            spool.seek(SeekFrom::Start(0))?;
            decode_archive(spool)
        })
        .await;

        match decoded {
            Ok(Ok(lines)) => {
                tracing::debug!(%url, lines = lines.len(), "archive decoded");
                Ok(lines)
            }
            Ok(Err(source)) => Err(FetchError::Decompress { url, source }),
            Err(e) => Err(FetchError::Join {
                url,
                reason: e.to_string(),
            }),
        }
    }

    fn locate(&self, hour: &HourId) -> String {
        archive_url(&self.base_url, hour)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;
    use flate2::{Compression, write::GzEncoder};

    use super::*;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn archive_url_tolerates_trailing_slash() {
        let hour = HourId::new(NaiveDate::from_ymd_opt(2014, 11, 1).unwrap(), 0).unwrap();
        assert_eq!(
            archive_url("https://data.gharchive.org/", &hour),
            "https://data.gharchive.org/2014-11-01-0.json.gz"
        );
        assert_eq!(
            archive_url("https://data.gharchive.org", &hour),
            "https://data.gharchive.org/2014-11-01-0.json.gz"
        );
    }

    #[test]
    fn decode_keeps_order_and_skips_blank_lines() {
        let bytes = gzip("{\"a\":1}\n\n{\"a\":2}\n   \n{\"a\":3}\n");
        let lines = decode_archive(bytes.as_slice()).unwrap();
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
    }

    #[test]
    fn decode_reads_every_gzip_member() {
        let mut bytes = gzip("{\"a\":1}\n");
        bytes.extend(gzip("{\"a\":2}\n"));
        let lines = decode_archive(bytes.as_slice()).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn decode_rejects_non_gzip_input() {
        let result = decode_archive(&b"definitely not gzip"[..]);
        assert!(result.is_err());
    }
}
