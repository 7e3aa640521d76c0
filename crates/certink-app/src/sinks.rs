//! Archive sinks writing batch output to disk.

use certink_render::{Archive, ArchiveSink};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Writes the archive as a single zip file.
#[derive(Debug, Clone)]
pub struct ZipSink {
    path: PathBuf,
}

impl ZipSink {
    /// `path` is used as-is when it names a file. When it is an existing
    /// directory the archive's suggested name is placed inside it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn target(&self, archive: &Archive) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(&archive.name)
        } else {
            self.path.clone()
        }
    }
}

impl ArchiveSink for ZipSink {
    fn write_archive(&mut self, archive: &Archive) -> io::Result<()> {
        let target = self.target(archive);
        ensure_parent(&target)?;
        let mut zip = ZipWriter::new(File::create(&target)?);
        // PNG payloads are already compressed
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for entry in &archive.entries {
            zip.start_file(entry.file_name.as_str(), options).map_err(io::Error::other)?;
            zip.write_all(&entry.data)?;
        }
        zip.finish().map_err(io::Error::other)?;
        log::info!("Wrote {} files to {}", archive.len(), target.display());
        Ok(())
    }
}

/// Writes each entry as a loose file in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArchiveSink for DirectorySink {
    fn write_archive(&mut self, archive: &Archive) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        for entry in &archive.entries {
            fs::write(self.dir.join(&entry.file_name), &entry.data)?;
        }
        log::info!("Wrote {} files to {}", archive.len(), self.dir.display());
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
