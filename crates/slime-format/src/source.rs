//! Where slime bytes come from and go to.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

pub trait SlimeSource: Send + Sync {
    fn load(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Opens the sink. Whatever was stored before is replaced.
    fn save(&self) -> io::Result<Box<dyn Write + Send>>;

    /// Replaces the stored bytes with `bytes`.
    fn store(&self, bytes: &[u8]) -> io::Result<()> {
        let mut sink = self.save()?;
        sink.write_all(bytes)?;
        sink.flush()
    }
}

/// A slime file on disk.
#[derive(Debug, Clone)]
pub struct FileSlimeSource {
    path: PathBuf,
}

impl FileSlimeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SlimeSource for FileSlimeSource {
    fn load(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn save(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(BufWriter::new(File::create(&self.path)?)))
    }

    /// Writes a sibling temp file and renames it over the world, so the old file
    /// stays intact until the new one is complete.
    fn store(&self, bytes: &[u8]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// An in-memory source. Clones share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySlimeSource {
    data: Arc<Mutex<Vec<u8>>>,
    saves: Arc<AtomicUsize>,
}

fn lock(data: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySlimeSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(bytes)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.data).clone()
    }

    /// How many times the sink was opened.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

struct MemoryWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.data).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SlimeSource for MemorySlimeSource {
    fn load(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::Cursor::new(self.bytes())))
    }

    fn save(&self) -> io::Result<Box<dyn Write + Send>> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        lock(&self.data).clear();
        Ok(Box::new(MemoryWriter {
            data: Arc::clone(&self.data),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_replaces_on_save() {
        let source = MemorySlimeSource::new(vec![1, 2, 3]);
        let mut loaded = Vec::new();
        source.load().unwrap().read_to_end(&mut loaded).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);

        let shared = source.clone();
        let mut sink = source.save().unwrap();
        sink.write_all(&[9, 9]).unwrap();
        drop(sink);
        assert_eq!(shared.bytes(), vec![9, 9]);
        assert_eq!(shared.save_count(), 1);
    }

    #[test]
    fn test_file_source_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSlimeSource::new(dir.path().join("world.slime"));
        assert!(source.load().is_err());

        let mut sink = source.save().unwrap();
        sink.write_all(b"slime").unwrap();
        sink.flush().unwrap();
        drop(sink);

        let mut loaded = Vec::new();
        source.load().unwrap().read_to_end(&mut loaded).unwrap();
        assert_eq!(loaded, b"slime");
    }

    #[test]
    fn test_file_store_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSlimeSource::new(dir.path().join("world.slime"));
        source.store(b"first world").unwrap();
        source.store(b"second").unwrap();

        let mut loaded = Vec::new();
        source.load().unwrap().read_to_end(&mut loaded).unwrap();
        assert_eq!(loaded, b"second");
        // No temp files are left next to the world.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
