//! Zip extraction for theme installs.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::config::{DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_ARCHIVE_ENTRIES};
use crate::error::{ThemeError, ThemeResult};

/// Caps applied while extracting an archive.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ARCHIVE_ENTRIES,
            max_total_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }
}

/// Extracts every entry of the zip at `archive_path` below `dest`.
///
/// Entries whose names would land outside `dest` (absolute paths, `..`
/// components) are skipped. Archives with more entries than
/// `limits.max_entries`, or whose files expand past `limits.max_total_bytes`,
/// fail with [`ThemeError::Archive`]; the byte cap is enforced on the data
/// actually written, not only on the sizes the archive declares. Returns the
/// number of files written.
pub fn extract_zip(archive_path: &Path, dest: &Path, limits: ExtractLimits) -> ThemeResult<usize> {
    let archive_error = |reason: String| ThemeError::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(archive_path).map_err(ThemeError::io_at("open archive", archive_path))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| archive_error(format!("Invalid zip archive: {e}")))?;

    if archive.len() > limits.max_entries {
        return Err(archive_error(format!(
            "Archive has {} entries (limit {})",
            archive.len(),
            limits.max_entries
        )));
    }

    let too_large = || archive_error(format!("Archive expands past {} bytes", limits.max_total_bytes));
    let mut extracted = 0;
    let mut written: u64 = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| archive_error(format!("Unreadable entry #{index}: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            log::warn!(
                "Skipping archive entry with unsafe path '{}' in {}",
                entry.name(),
                archive_path.display()
            );
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(ThemeError::io_at("create directory", &out_path))?;
            continue;
        }

        let remaining = limits.max_total_bytes.saturating_sub(written);
        if entry.size() > remaining {
            return Err(too_large());
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(ThemeError::io_at("create directory", parent))?;
        }
        let mut out_file =
            fs::File::create(&out_path).map_err(ThemeError::io_at("create file", &out_path))?;
        // One byte past the cap is enough to detect a lying size header
        let copied = io::copy(&mut (&mut entry).take(remaining.saturating_add(1)), &mut out_file)
            .map_err(ThemeError::io_at("extract", &out_path))?;
        if copied > remaining {
            return Err(too_large());
        }
        written += copied;
        extracted += 1;
    }

    log::debug!(
        "Extracted {extracted} file(s) from {} into {}",
        archive_path.display(),
        dest.display()
    );
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("theme.zip");
        build_zip(
            &archive,
            &[
                ("wrapper/", ""),
                ("wrapper/theme.json", "{}"),
                ("wrapper/views/home.html", "<p>"),
            ],
        );

        let dest = tmp.path().join("out");
        let count = assert_ok!(extract_zip(&archive, &dest, ExtractLimits::default()));
        assert_eq!(count, 2);
        assert!(dest.join("wrapper/theme.json").is_file());
        assert_eq!(
            fs::read_to_string(dest.join("wrapper/views/home.html")).unwrap(),
            "<p>"
        );
    }

    #[test]
    fn skips_escaping_entries() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("evil.zip");
        build_zip(&archive, &[("../escape.txt", "x"), ("ok.txt", "y")]);

        let dest = tmp.path().join("out");
        let count = assert_ok!(extract_zip(&archive, &dest, ExtractLimits::default()));
        assert_eq!(count, 1);
        assert!(!tmp.path().join("escape.txt").exists());
        assert!(dest.join("ok.txt").is_file());
    }

    #[test]
    fn rejects_non_zip_files() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("fake.zip");
        fs::write(&archive, "definitely not a zip").unwrap();
        assert_matches!(
            extract_zip(&archive, &tmp.path().join("out"), ExtractLimits::default()),
            Err(ThemeError::Archive { .. })
        );
    }

    #[test]
    fn enforces_entry_and_size_limits() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("big.zip");
        let payload = "0".repeat(4096);
        build_zip(
            &archive,
            &[("a.txt", payload.as_str()), ("b.txt", payload.as_str()), ("c.txt", "tiny")],
        );

        let too_few_entries = ExtractLimits {
            max_entries: 2,
            max_total_bytes: u64::MAX,
        };
        assert_matches!(
            extract_zip(&archive, &tmp.path().join("entries"), too_few_entries),
            Err(ThemeError::Archive { reason, .. }) if reason.contains("3 entries")
        );

        let too_few_bytes = ExtractLimits {
            max_entries: 100,
            max_total_bytes: 6000,
        };
        assert_matches!(
            extract_zip(&archive, &tmp.path().join("bytes"), too_few_bytes),
            Err(ThemeError::Archive { reason, .. }) if reason.contains("6000 bytes")
        );

        let enough = ExtractLimits {
            max_entries: 3,
            max_total_bytes: 8196,
        };
        assert_eq!(assert_ok!(extract_zip(&archive, &tmp.path().join("ok"), enough)), 3);
    }
}
