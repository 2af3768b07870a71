//! Crash-safe file replacement.
//!
//! Content is written to a sibling `<name>.tmp`, flushed and synced, then
//! renamed over the destination. A partially written temp file never
//! survives: it is removed when the writer is dropped without committing.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Sibling temp path used while `path` is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// An in-progress atomic write.
pub struct AtomicWriter {
    dest: PathBuf,
    tmp: PathBuf,
    file: Option<File>,
}

impl AtomicWriter {
    pub async fn create(dest: impl Into<PathBuf>) -> io::Result<Self> {
        let dest = dest.into();
        let tmp = temp_path(&dest);
        let file = File::create(&tmp).await?;
        Ok(Self {
            dest,
            tmp,
            file: Some(file),
        })
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("atomic writer already committed"))
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file()?.write_all(bytes).await
    }

    pub async fn copy_from<R>(&mut self, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::io::copy(reader, self.file()?).await
    }

    /// Flushes, syncs and moves the temp file into place.
    pub async fn commit(mut self) -> io::Result<()> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| io::Error::other("atomic writer already committed"))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&self.tmp, &self.dest).await?;
        // Renamed; nothing left for Drop to clean up.
        self.tmp = PathBuf::new();
        Ok(())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if !self.tmp.as_os_str().is_empty() {
            self.file.take();
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

/// Atomically replaces `path` with `bytes`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut writer = AtomicWriter::create(path).await?;
    writer.write_all(bytes).await?;
    writer.commit().await
}

/// Atomically copies `src` to `dst`, returning the number of bytes copied.
pub async fn copy_atomic(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut input = File::open(src).await?;
    let mut writer = AtomicWriter::create(dst).await?;
    let copied = writer.copy_from(&mut input).await?;
    writer.commit().await?;
    Ok(copied)
}
