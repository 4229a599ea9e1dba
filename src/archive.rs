use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, trace};
use walkdir::WalkDir;

use crate::error::BoupyError;
use crate::naming::ARCHIVE_SUFFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Symlink,
    Directory,
}

impl FileType {
    pub fn from(t: fs::FileType) -> Option<FileType> {
        if t.is_dir() {
            Some(FileType::Directory)
        } else if t.is_file() {
            Some(FileType::File)
        } else if t.is_symlink() {
            Some(FileType::Symlink)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub files: u64,
    pub links: u64,
    pub directories: u64,
    pub size: u64,
}

#[derive(Debug)]
pub struct Archive {
    pub path: PathBuf,
    pub stats: Stats,
}

/// Fails with `SourceNotFound` unless `source` is a readable directory.
pub fn check_source(source: &Path) -> Result<(), BoupyError> {
    let readable = source.is_dir() && fs::read_dir(source).is_ok();
    if readable {
        Ok(())
    } else {
        Err(BoupyError::SourceNotFound(source.to_path_buf()))
    }
}

/// Writes `{temp_dir}/{name}.tar.gz` holding the tree under `source`, rooted
/// at a single directory called `name`. Symlinks are stored, not followed.
/// Nothing is left behind on failure.
pub fn create_archive(source: &Path, temp_dir: &Path, name: &str) -> Result<Archive> {
    check_source(source)?;

    let path = temp_dir.join(format!("{}{}", name, ARCHIVE_SUFFIX));
    info!("Archiving {:?} to {:?}", source, path);

    match write_archive(source, &path, name) {
        Ok(stats) => Ok(Archive { path, stats }),
        Err(e) => {
            if let Err(rm) = fs::remove_file(&path) {
                debug!("Could not remove partial archive {:?}: {}", path, rm);
            }
            Err(e)
        }
    }
}

fn write_archive(source: &Path, path: &Path, name: &str) -> Result<Stats> {
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    // The temp dir may live inside the source, never archive ourselves.
    let own_path = fs::canonicalize(path)?;
    let source_root = fs::canonicalize(source)?;

    let mut stats = Stats::default();
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {:?}", source))?;
        let relative = entry.path().strip_prefix(source)?;
        if source_root.join(relative) == own_path {
            debug!("Skipping the archive being written {:?}", entry.path());
            continue;
        }
        let archived_as = Path::new(name).join(relative);
        trace!("Adding {:?} as {:?}", entry.path(), archived_as);

        match FileType::from(entry.file_type()) {
            Some(file_type) => {
                builder
                    .append_path_with_name(entry.path(), &archived_as)
                    .with_context(|| format!("adding {:?}", entry.path()))?;
                match file_type {
                    FileType::File => {
                        stats.files += 1;
                        stats.size += entry.metadata()?.len();
                    }
                    FileType::Symlink => stats.links += 1,
                    FileType::Directory => stats.directories += 1,
                }
            }
            None => debug!("Skipping special file {:?}", entry.path()),
        }
    }

    let encoder = builder.into_inner()?;
    let mut writer = encoder.finish()?;
    io::Write::flush(&mut writer)?;
    Ok(stats)
}

/// Unpacks a `.tar.gz` into `destination`, creating it if needed.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).with_context(|| format!("creating {:?}", destination))?;
    let file = File::open(archive).with_context(|| format!("opening {:?}", archive))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball
        .unpack(destination)
        .with_context(|| format!("extracting {:?} into {:?}", archive, destination))?;
    info!("Extracted {:?} into {:?}", archive, destination);
    Ok(())
}
