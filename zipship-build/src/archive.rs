//! Zip container plumbing shared by both archive kinds.
//!
//! ## Construction protocol
//!
//! 1. Open `<output>.zipship.tmp` and hand a [`ArchiveWriter`] to the caller.
//! 2. The caller adds entries; any error aborts.
//! 3. Finish the central directory and rename the temp file onto `output`.
//! 4. On failure in 1–3 remove the temp file only and report
//!    [`BuildError::PartialBuild`]. Whatever sits at `output` is never touched.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use zipship_core::keys::METADATA_FILE;
use zipship_core::IniDocument;

use crate::error::{io_err, zip_err, BuildError};

const STAGING_SUFFIX: &str = ".zipship.tmp";

/// `<output>.zipship.tmp`
pub fn staging_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Streaming writer for one archive under construction.
pub struct ArchiveWriter {
    zip: ZipWriter<BufWriter<File>>,
    path: PathBuf,
    entries: usize,
}

impl ArchiveWriter {
    fn create(path: &Path) -> Result<Self, BuildError> {
        let file = File::create(path).map_err(|e| io_err(path, e))?;
        Ok(ArchiveWriter {
            zip: ZipWriter::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            entries: 0,
        })
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Copy the regular file at `source` into the archive as `entry`.
    pub fn add_file(&mut self, source: &Path, entry: &str) -> Result<(), BuildError> {
        let mut input = File::open(source).map_err(|e| io_err(source, e))?;
        let metadata = input.metadata().map_err(|e| io_err(source, e))?;

        let mut options = Self::options().large_file(metadata.len() >= u64::from(u32::MAX));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            options = options.unix_permissions(metadata.permissions().mode());
        }

        self.zip
            .start_file(entry, options)
            .map_err(|e| zip_err(&self.path, e))?;
        io::copy(&mut input, &mut self.zip).map_err(|e| io_err(source, e))?;
        self.entries += 1;
        Ok(())
    }

    /// Write `bytes` into the archive as `entry`.
    pub fn add_bytes(&mut self, entry: &str, bytes: &[u8]) -> Result<(), BuildError> {
        self.zip
            .start_file(entry, Self::options())
            .map_err(|e| zip_err(&self.path, e))?;
        self.zip.write_all(bytes).map_err(|e| io_err(&self.path, e))?;
        self.entries += 1;
        Ok(())
    }

    fn finish(self) -> Result<usize, BuildError> {
        let mut inner = self.zip.finish().map_err(|e| zip_err(&self.path, e))?;
        inner.flush().map_err(|e| io_err(&self.path, e))?;
        inner
            .get_ref()
            .sync_all()
            .map_err(|e| io_err(&self.path, e))?;
        Ok(self.entries)
    }
}

/// Build a new archive at `output` through a temp sibling.
///
/// Returns the number of entries written.
pub fn assemble<F>(output: &Path, fill: F) -> Result<usize, BuildError>
where
    F: FnOnce(&mut ArchiveWriter) -> Result<(), BuildError>,
{
    let tmp = staging_path(output);
    let result = write_into(&tmp, fill).and_then(|entries| {
        std::fs::rename(&tmp, output)
            .map(|_| entries)
            .map_err(|e| io_err(output, e))
    });

    result.map_err(|source| {
        if tmp.is_file() {
            if let Err(e) = std::fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), "could not remove partial archive: {e}");
            }
        }
        BuildError::PartialBuild {
            archive: output.to_path_buf(),
            source: Box::new(source),
        }
    })
}

fn write_into<F>(tmp: &Path, fill: F) -> Result<usize, BuildError>
where
    F: FnOnce(&mut ArchiveWriter) -> Result<(), BuildError>,
{
    if let Some(parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut writer = ArchiveWriter::create(tmp)?;
    fill(&mut writer)?;
    writer.finish()
}

// ---------------------------------------------------------------------------
// Walking
// ---------------------------------------------------------------------------

/// A file on disk and the archive entry it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedFile {
    pub source: PathBuf,
    pub entry: String,
}

/// Every regular file under `root`, sorted by entry name.
///
/// `prune` is asked about each directory below the root; returning `true`
/// skips it and everything beneath it. `keep` filters individual files.
/// Paths listed in `exclude` are never packaged.
pub fn collect_files(
    root: &Path,
    prune: impl Fn(&Path) -> bool,
    keep: impl Fn(&Path) -> bool,
    exclude: &[PathBuf],
) -> Result<Vec<PackagedFile>, BuildError> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && prune(e.path())));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, io::Error::other(e))
        })?;
        if !is_regular_file(&entry) || exclude.iter().any(|x| x == entry.path()) {
            continue;
        }
        if !keep(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        files.push(PackagedFile {
            source: entry.path().to_path_buf(),
            entry: entry_name(relative),
        });
    }
    files.sort_by(|a, b| a.entry.cmp(&b.entry));
    Ok(files)
}

/// Plain files, plus symlinks whose target is a file. Symlinked
/// directories are listed but never descended into.
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    let kind = entry.file_type();
    kind.is_file() || (kind.is_symlink() && entry.path().metadata().is_ok_and(|m| m.is_file()))
}

/// Forward-slash entry name for a relative path.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Raw bytes of `entry` inside `archive`.
///
/// A file that cannot be opened is [`BuildError::Io`]; anything wrong with the
/// container or the entry is [`BuildError::Zip`].
pub fn read_entry(archive: &Path, entry: &str) -> Result<Vec<u8>, BuildError> {
    let file = File::open(archive).map_err(|e| io_err(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| zip_err(archive, e))?;
    let mut member = zip.by_name(entry).map_err(|e| zip_err(archive, e))?;
    let mut bytes = Vec::new();
    member
        .read_to_end(&mut bytes)
        .map_err(|e| zip_err(archive, zip::result::ZipError::Io(e)))?;
    Ok(bytes)
}

/// The embedded metadata record of either archive kind, undecoded.
pub fn read_metadata_document(archive: &Path) -> Result<IniDocument, BuildError> {
    let bytes = read_entry(archive, METADATA_FILE)?;
    IniDocument::from_bytes(&bytes).map_err(|source| BuildError::Metadata {
        path: archive.to_path_buf(),
        source,
    })
}
