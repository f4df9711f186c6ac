//! Supported media formats and upload content types.

use std::collections::HashSet;
use std::path::Path;

/// Content type declared for extensions missing from the table below
pub const FALLBACK_CONTENT_TYPE: &str = "image/jpeg";

const CONTENT_TYPES: &[(&str, &str)] = &[
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".heic", "image/heic"),
    (".heif", "image/heif"),
    (".webp", "image/webp"),
    (".tiff", "image/tiff"),
    (".tif", "image/tiff"),
    (".bmp", "image/bmp"),
    (".mpg", "video/mpeg"),
    (".mpeg", "video/mpeg"),
    (".avi", "video/x-msvideo"),
    (".mov", "video/quicktime"),
    (".mp4", "video/mp4"),
    (".m4v", "video/x-m4v"),
    (".wmv", "video/x-ms-wmv"),
    (".3gp", "video/3gpp"),
    (".3g2", "video/3gpp2"),
    (".mkv", "video/x-matroska"),
    (".mts", "video/mp2t"),
    (".m2ts", "video/mp2t"),
];

/// Lower-cased extension of `path` including the leading dot, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Content type announced when starting a transfer session
pub fn content_type_for(path: &Path) -> &'static str {
    extension_of(path)
        .and_then(|ext| {
            CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, content_type)| *content_type)
        })
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Static allow-list of extensions eligible for backup
#[derive(Clone, Debug, Default)]
pub struct FormatPolicy {
    extensions: HashSet<String>,
}

impl FormatPolicy {
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
        Self { extensions }
    }

    /// `extension` is matched case-insensitively, with or without the leading dot.
    pub fn is_supported(&self, extension: &str) -> bool {
        let ext = extension.trim().to_lowercase();
        if ext.starts_with('.') {
            self.extensions.contains(&ext)
        } else {
            self.extensions.contains(&format!(".{}", ext))
        }
    }

    pub fn is_supported_path(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
