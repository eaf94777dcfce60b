//! Verbatim segment archival to local disk.

use std::path::PathBuf;

use crate::segment::Segment;

/// Writes each completed segment to `<dir>/<id>.ts` before motion
/// detection runs, so footage survives even when later stages fail.
pub struct SegmentArchive {
    dir: PathBuf,
}

impl SegmentArchive {
    pub fn new(dir: PathBuf) -> Self {
        SegmentArchive { dir }
    }

    pub async fn store(&self, segment: &Segment) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.ts", segment.id()));
        tokio::fs::write(&path, &segment.data).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    #[tokio::test]
    async fn test_store_writes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SegmentArchive::new(dir.path().join("segments"));

        let segment = Segment {
            start: Utc::now(),
            data: Bytes::from_static(b"raw-ts-bytes"),
            frames: 3,
        };

        let path = archive.store(&segment).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("{}.ts", segment.id())
        );
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"raw-ts-bytes");
    }
}
