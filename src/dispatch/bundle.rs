//! Zip codec for document bundles.

use std::io::{Cursor, Read, Write};

use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use super::{DispatchError, TransformError};

/// A member extracted from a bundle; extraction failures stay attached to the member name.
#[derive(Debug)]
pub struct BundleMember {
    /// Member path inside the archive, using `/` separators.
    pub name: String,
    /// Extracted bytes or the reason the member could not be read.
    pub content: Result<Vec<u8>, TransformError>,
}

impl BundleMember {
    /// Build a member with readable content.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: Ok(content),
        }
    }
}

/// Named output file stored in a result bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// Path inside the archive.
    pub name: String,
    /// File content.
    pub content: Vec<u8>,
}

/// Read every document member of a zip archive in archive order.
///
/// Directories, `__MACOSX/` resource forks and hidden files are skipped. Members with paths
/// escaping the archive root are reported as per-member extraction errors.
pub fn unpack(bytes: &[u8]) -> Result<Vec<BundleMember>, DispatchError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| DispatchError::InvalidBundle(error.to_string()))?;

    let mut members = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let listed_name = archive
            .name_for_index(index)
            .map(|name| name.replace('\\', "/"));
        let mut file = match (archive.by_index(index), listed_name) {
            (Ok(file), _) => file,
            (Err(error), Some(name)) if !name.ends_with('/') && !is_ignored(&name) => {
                members.push(BundleMember {
                    name: name.clone(),
                    content: Err(TransformError::Extraction {
                        name,
                        reason: error.to_string(),
                    }),
                });
                continue;
            }
            (Err(_), Some(_)) => continue,
            (Err(error), None) => return Err(DispatchError::InvalidBundle(error.to_string())),
        };
        let raw_name = file.name().replace('\\', "/");

        if file.is_dir() || is_ignored(&raw_name) {
            continue;
        }

        let Some(enclosed) = file.enclosed_name() else {
            members.push(BundleMember {
                content: Err(TransformError::Extraction {
                    name: raw_name.clone(),
                    reason: "path escapes the archive root".into(),
                }),
                name: raw_name,
            });
            continue;
        };
        let name = enclosed
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let mut buffer = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        let content = match file.read_to_end(&mut buffer) {
            Ok(_) => Ok(buffer),
            Err(error) => Err(TransformError::Extraction {
                name: name.clone(),
                reason: error.to_string(),
            }),
        };
        members.push(BundleMember { name, content });
    }

    Ok(members)
}

/// Encode entries as a deflate-compressed zip archive.
pub fn pack(entries: &[BundleEntry]) -> Result<Vec<u8>, DispatchError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|error| DispatchError::Pack(error.to_string()))?;
        writer
            .write_all(&entry.content)
            .map_err(|error| DispatchError::Pack(error.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|error| DispatchError::Pack(error.to_string()))?;
    Ok(cursor.into_inner())
}

fn is_ignored(path: &str) -> bool {
    if path.starts_with("__MACOSX/") {
        return true;
    }
    path.rsplit('/')
        .next()
        .is_some_and(|file_name| file_name.starts_with('.'))
}
