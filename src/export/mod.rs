//! Archive export of a document's image and extracted text.
//!
//! Archives are built entirely in memory:
//! - the image entry is stored uncompressed under the original file name
//! - the text entry is deflated and named after the file stem with `.txt`
//!
//! Entries always appear image first, then text. Timestamps are fixed per
//! input so the same document always produces the same bytes.

mod sink;

pub use sink::{sanitize_file_name, ArchiveSink, DirectorySink};

use std::borrow::Cow;
use std::io::{Cursor, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Fallback stem when a file name has nothing usable left.
const DEFAULT_STEM: &str = "document";

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image entry to store in an archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveImage<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

/// Text entry to store in an archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveText<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

/// A finished archive and the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Builder for a document archive with at most one image and one text entry.
pub struct ArchiveBuilder<'a> {
    base_name: String,
    image: Option<ArchiveImage<'a>>,
    text: Option<ArchiveText<'a>>,
    modified_at: Option<DateTime<Utc>>,
}

impl<'a> ArchiveBuilder<'a> {
    /// Start an archive whose download name is `<base_name>.zip`.
    pub fn new(base_name: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            image: None,
            text: None,
            modified_at: None,
        }
    }

    pub fn image(mut self, image: Option<ArchiveImage<'a>>) -> Self {
        self.image = image;
        self
    }

    pub fn text(mut self, text: Option<ArchiveText<'a>>) -> Self {
        self.text = text;
        self
    }

    /// Timestamp recorded on every entry. Defaults to the zip epoch (1980-01-01).
    pub fn modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    /// Write the archive into memory.
    pub fn build(self) -> Result<DocumentArchive, ArchiveError> {
        let timestamp = self
            .modified_at
            .map(zip_timestamp)
            .unwrap_or_default();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        if let Some(image) = self.image {
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(timestamp);
            writer.start_file(image.name, options)?;
            writer.write_all(image.bytes)?;
        }

        if let Some(text) = self.text {
            // Zip entries must be unique; a text-named image keeps its name.
            let name = match self.image {
                Some(image) if image.name == text.name => {
                    format!("{}.extracted.txt", strip_extension(text.name))
                }
                _ => text.name.to_string(),
            };
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(timestamp);
            writer.start_file(name, options)?;
            writer.write_all(text.content.as_bytes())?;
        }

        let bytes = writer.finish()?.into_inner();

        Ok(DocumentArchive {
            file_name: archive_file_name(&self.base_name),
            bytes,
        })
    }
}

/// Build an archive from an optional image and optional text entry.
pub fn build_archive(
    base_name: &str,
    image: Option<ArchiveImage<'_>>,
    text: Option<ArchiveText<'_>>,
) -> Result<DocumentArchive, ArchiveError> {
    ArchiveBuilder::new(base_name).image(image).text(text).build()
}

/// Remove the final extension from a file name.
///
/// `scan.page1.png` becomes `scan.page1` and `.png` becomes an empty stem.
/// Names without an extension are returned unchanged.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => stem,
        _ => file_name,
    }
}

/// Name of the image entry inside an archive.
///
/// The server's file name is kept as is unless it could escape the archive
/// root or is blank, in which case it is sanitized.
pub fn image_entry_name(file_name: &str) -> Cow<'_, str> {
    let unsafe_name = file_name.trim().is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.chars().any(|c| matches!(c, '/' | '\\') || c.is_control());
    if unsafe_name {
        Cow::Owned(sanitize_file_name(file_name))
    } else {
        Cow::Borrowed(file_name)
    }
}

/// Base name used for export file names.
pub fn base_name(file_name: &str) -> &str {
    let stem = strip_extension(file_name.trim());
    if stem.is_empty() {
        DEFAULT_STEM
    } else {
        stem
    }
}

/// Name of the text entry for a document file name.
///
/// Only the final extension is replaced, so `.png` gives `.txt`.
pub fn text_entry_name(file_name: &str) -> String {
    let name = file_name.trim();
    if name.is_empty() {
        return format!("{}.txt", DEFAULT_STEM);
    }
    format!("{}.txt", strip_extension(name))
}

/// Suggested download name for an archive.
pub fn archive_file_name(base_name: &str) -> String {
    format!("{}.zip", base_name)
}

fn zip_timestamp(at: DateTime<Utc>) -> zip::DateTime {
    u16::try_from(at.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                at.month() as u8,
                at.day() as u8,
                at.hour() as u8,
                at.minute() as u8,
                at.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}
