use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
}

impl ArchiveFormat {
    /// Identifies the archive format from the transfer filename.
    pub fn identify(filename: &str) -> Result<Self, ExtractError> {
        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if filename.ends_with(".tar") {
            Ok(Self::Tar)
        } else {
            Err(ExtractError::UnsupportedFormat {
                filename: filename.to_string(),
            })
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported archive format for {filename}")]
    UnsupportedFormat { filename: String },
    #[error("archive entries escape the extraction root: {}", names.join(", "))]
    UnsafeEntries { names: Vec<String> },
    #[error("archive extraction failed: {0}")]
    Io(#[from] io::Error),
}

/// Unpacks the archive under `target_root`, streaming entries as they arrive
/// from the reader.
///
/// Entry paths are normalized lexically; any entry that would resolve outside
/// the root (parent-dir or absolute components) is recorded and skipped
/// without disturbing its siblings, and the call ends with an unsafe-path
/// error naming the offenders. Entries whose target already exists are
/// skipped unconditionally, so re-running over a populated root changes
/// nothing. Existence is not an integrity check: a partial file left behind
/// by an aborted run is treated as extracted.
///
/// `entry_filter` decides which entries are unpacked at all; `on_root` is
/// invoked once with the archive's top-level directory under the root.
pub fn extract<R, F, O>(
    format: ArchiveFormat,
    reader: R,
    target_root: &Path,
    entry_filter: F,
    on_root: O,
) -> Result<(), ExtractError>
where
    R: Read,
    F: FnMut(&Path) -> bool,
    O: FnMut(&Path),
{
    match format {
        ArchiveFormat::TarGz => walk(
            tar::Archive::new(GzDecoder::new(reader)),
            target_root,
            entry_filter,
            on_root,
        ),
        ArchiveFormat::Tar => walk(tar::Archive::new(reader), target_root, entry_filter, on_root),
    }
}

fn walk<R, F, O>(
    mut archive: tar::Archive<R>,
    target_root: &Path,
    mut entry_filter: F,
    mut on_root: O,
) -> Result<(), ExtractError>
where
    R: Read,
    F: FnMut(&Path) -> bool,
    O: FnMut(&Path),
{
    let mut unsafe_names = Vec::new();
    let mut root_reported = false;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();

        if !entry_filter(&name) {
            continue;
        }

        let Some(relative) = sandboxed_entry_path(&name) else {
            unsafe_names.push(name.display().to_string());
            continue;
        };
        let Some(first) = relative.components().next() else {
            continue;
        };

        if !root_reported {
            on_root(&target_root.join(first.as_os_str()));
            root_reported = true;
        }

        let target = target_root.join(&relative);
        if fs::symlink_metadata(&target).is_ok() {
            continue;
        }

        match entry.header().entry_type() {
            tar::EntryType::Directory => fs::create_dir_all(&target)?,
            tar::EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                io::copy(&mut entry, &mut out)?;
            }
            // Links and special entries are not part of the runtime source
            // contract and could themselves escape the sandbox.
            _ => continue,
        }
    }

    if unsafe_names.is_empty() {
        Ok(())
    } else {
        Err(ExtractError::UnsafeEntries {
            names: unsafe_names,
        })
    }
}

/// Lexically re-roots an entry path: normal components are kept, `.` is
/// dropped, and anything that could climb out (parent dirs, absolute roots,
/// prefixes) rejects the entry.
fn sandboxed_entry_path(name: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    use super::{ArchiveFormat, ExtractError, extract};

    fn dir_header(path: &str) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_path(path).expect("dir path");
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        header
    }

    fn file_entry(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        // Write the name bytes directly: `set_path`/`append_data` reject `..`
        // components, which the traversal test needs in its fixture.
        header.as_gnu_mut().expect("gnu header").name[..path.len()]
            .copy_from_slice(path.as_bytes());
        header.set_cksum();
        builder.append(&header, data).expect("append file entry");
    }

    fn sample_archive() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append(&dir_header("pkg-abc1234/"), std::io::empty())
            .expect("append dir");
        file_entry(&mut builder, "pkg-abc1234/README.md", b"hello\n");
        file_entry(&mut builder, "pkg-abc1234/src/main.c", b"int main;\n");
        builder.into_inner().expect("finish archive")
    }

    fn extract_sample(target: &Path) -> (Result<(), ExtractError>, Option<PathBuf>) {
        let mut root = None;
        let result = extract(
            ArchiveFormat::Tar,
            Cursor::new(sample_archive()),
            target,
            |_| true,
            |reported| root = Some(reported.to_path_buf()),
        );
        (result, root)
    }

    #[test]
    fn extracts_entries_and_reports_the_top_level_root() {
        let temp = tempfile::tempdir().expect("temp dir");
        let (result, root) = extract_sample(temp.path());

        result.expect("extract");
        assert_eq!(root, Some(temp.path().join("pkg-abc1234")));
        assert_eq!(
            fs::read(temp.path().join("pkg-abc1234/README.md")).expect("read file"),
            b"hello\n"
        );
        assert!(temp.path().join("pkg-abc1234/src/main.c").is_file());
    }

    #[test]
    fn gzip_archives_are_identified_and_unpacked() {
        use std::io::Write;

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&sample_archive()).expect("compress");
        let compressed = encoder.finish().expect("finish gzip");

        let format = ArchiveFormat::identify("pkg-abc1234.tar.gz").expect("identify");
        assert_eq!(format, ArchiveFormat::TarGz);

        let temp = tempfile::tempdir().expect("temp dir");
        extract(format, Cursor::new(compressed), temp.path(), |_| true, |_| {})
            .expect("extract gzip");
        assert!(temp.path().join("pkg-abc1234/README.md").is_file());
    }

    #[test]
    fn unknown_extensions_are_rejected_at_identification() {
        let error = ArchiveFormat::identify("pkg.zip").expect_err("identify should fail");
        assert!(matches!(error, ExtractError::UnsupportedFormat { .. }));
    }

    #[test]
    fn traversal_entries_are_rejected_without_affecting_siblings() {
        let mut builder = tar::Builder::new(Vec::new());
        file_entry(&mut builder, "pkg-abc1234/safe.txt", b"safe\n");
        file_entry(&mut builder, "../evil.txt", b"evil\n");
        file_entry(&mut builder, "pkg-abc1234/also-safe.txt", b"safe\n");
        let archive = builder.into_inner().expect("finish archive");

        let temp = tempfile::tempdir().expect("temp dir");
        let target = temp.path().join("root");
        fs::create_dir_all(&target).expect("target root");

        let error = extract(
            ArchiveFormat::Tar,
            Cursor::new(archive),
            &target,
            |_| true,
            |_| {},
        )
        .expect_err("unsafe entry should fail the extraction");

        match error {
            ExtractError::UnsafeEntries { names } => assert_eq!(names, vec!["../evil.txt"]),
            other => panic!("unexpected error: {other}"),
        }

        assert!(target.join("pkg-abc1234/safe.txt").is_file());
        assert!(target.join("pkg-abc1234/also-safe.txt").is_file());
        assert!(!temp.path().join("evil.txt").exists());
    }

    #[test]
    fn second_extraction_over_a_populated_root_modifies_nothing() {
        let temp = tempfile::tempdir().expect("temp dir");
        let (first, _) = extract_sample(temp.path());
        first.expect("first extract");

        let readme = temp.path().join("pkg-abc1234/README.md");
        fs::write(&readme, b"locally changed\n").expect("mutate file");

        let (second, _) = extract_sample(temp.path());
        second.expect("second extract");
        assert_eq!(fs::read(&readme).expect("read file"), b"locally changed\n");
    }

    #[test]
    fn entry_filter_excludes_entries_before_any_write() {
        let temp = tempfile::tempdir().expect("temp dir");
        let result = extract(
            ArchiveFormat::Tar,
            Cursor::new(sample_archive()),
            temp.path(),
            |path| !path.ends_with("README.md"),
            |_| {},
        );

        result.expect("extract");
        assert!(!temp.path().join("pkg-abc1234/README.md").exists());
        assert!(temp.path().join("pkg-abc1234/src/main.c").is_file());
    }
}
