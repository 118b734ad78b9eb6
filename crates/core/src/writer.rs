use std::path::Path;

use tokio::{
    fs::{self, File},
    io::{AsyncWrite, AsyncWriteExt, BufWriter},
};

use crate::{error::Result, types::Event};

/// Appends events as newline-delimited JSON
pub struct EventWriter<W: AsyncWrite + Unpin> {
    inner: BufWriter<W>,
    written: u64,
}

impl EventWriter<File> {
    /// Create (or truncate) the output file, making parent directories as needed
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;
        Ok(Self::new(file))
    }
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            written: 0,
        }
    }

    pub async fn write(&mut self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.inner.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Number of events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer
    pub async fn finish(mut self) -> Result<W> {
        self.inner.flush().await?;
        Ok(self.inner.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_event;

    #[tokio::test]
    async fn writes_one_compact_object_per_line() {
        let mut writer = EventWriter::new(Vec::new());
        writer
            .write(&parse_event(r#"{"type": "PushEvent", "id": "1"}"#).unwrap())
            .await
            .unwrap();
        writer
            .write(&parse_event(r#"{"type": "PushEvent", "id": "2"}"#).unwrap())
            .await
            .unwrap();
        assert_eq!(writer.written(), 2);

        let bytes = writer.finish().await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        for line in lines {
            assert!(!line.contains(": "), "expected compact JSON, got {line}");
            assert_eq!(parse_event(line).unwrap().event_type(), Some("PushEvent"));
        }
    }

    #[tokio::test]
    async fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/events.json");

        let mut writer = EventWriter::create(&path).await.unwrap();
        writer
            .write(&parse_event(r#"{"type":"PushEvent"}"#).unwrap())
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"type\":\"PushEvent\"}\n");
    }
}
