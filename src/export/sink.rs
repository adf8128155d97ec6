//! Destinations for finished archives.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Receives a finished archive and stores it somewhere.
pub trait ArchiveSink {
    /// Save `bytes` under the suggested file name, returning where it went.
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes archives into a directory without ever replacing existing files.
///
/// A second export of `scan.zip` lands in `scan (1).zip`, and so on.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

/// Give up looking for a free name after this many attempts.
const MAX_NAME_ATTEMPTS: u32 = 1000;

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArchiveSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let file_name = sanitize_file_name(file_name);
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
            _ => (file_name.clone(), String::new()),
        };

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                self.dir.join(&file_name)
            } else {
                self.dir.join(format!("{} ({}){}", stem, attempt, ext))
            };

            // create_new fails if the file exists, so two exports never race
            // onto the same path.
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    file.sync_all()?;
                    debug!("Saved archive to {}", candidate.display());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {} in {}", file_name, self.dir.display()),
        ))
    }
}

/// Make a server-provided file name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('_').trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.chars().take(150).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_writes_bytes() {
        let dir = tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        let path = sink.save("scan.zip", b"PK\x05\x06").unwrap();
        assert_eq!(path, dir.path().join("scan.zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x05\x06");
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        let first = sink.save("scan.zip", b"one").unwrap();
        let second = sink.save("scan.zip", b"two").unwrap();
        let third = sink.save("scan.zip", b"three").unwrap();

        assert_eq!(first, dir.path().join("scan.zip"));
        assert_eq!(second, dir.path().join("scan (1).zip"));
        assert_eq!(third, dir.path().join("scan (2).zip"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("exports/2024"));
        assert_eq!(sink.dir(), dir.path().join("exports/2024"));

        let path = sink.save("a.zip", b"x").unwrap();
        assert!(path.exists());
        assert_eq!(path.parent(), Some(sink.dir()));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd.zip"), "_.._etc_passwd.zip");
        assert_eq!(sanitize_file_name("scan:1?.zip"), "scan_1_.zip");
        assert_eq!(sanitize_file_name("  "), "document");
        assert_eq!(sanitize_file_name(".zip"), "zip");
        assert_eq!(sanitize_file_name("Recibo março.zip"), "Recibo março.zip");
    }
}
