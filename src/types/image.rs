//! Classification of the `image` field for orphaned-image repair.

use serde::{Deserialize, Serialize};

const INLINE_PREFIX: &str = "data:image/";
const UPLOAD_PREFIXES: &[&str] = &["uploads/", "/uploads/", "./uploads/"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "avif"];

/// What a doctor's `image` value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRef<'a> {
    Absent,
    /// Base64 (or otherwise inline) `data:image/...` payload.
    Inline,
    /// Reference into the uploads directory. `file_name` is the canonical bare name.
    File {
        stored: &'a str,
        file_name: &'a str,
    },
    /// Neither inline nor path-like (remote URLs, free text). Left alone by repair.
    Unknown(&'a str),
}

impl<'a> ImageRef<'a> {
    #[must_use]
    pub fn classify(image: Option<&'a str>) -> Self {
        let Some(raw) = image else {
            return Self::Absent;
        };
        let value = raw.trim();
        if value.is_empty() {
            return Self::Absent;
        }
        if value.starts_with(INLINE_PREFIX) {
            return Self::Inline;
        }
        if value.contains("://") {
            return Self::Unknown(raw);
        }

        let file_name = value.rsplit(['/', '\\']).next().unwrap_or(value);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Self::Unknown(raw);
        }
        let in_uploads = UPLOAD_PREFIXES.iter().any(|prefix| value.starts_with(prefix));
        if in_uploads || has_image_extension(file_name) {
            Self::File {
                stored: raw,
                file_name,
            }
        } else {
            Self::Unknown(raw)
        }
    }

    #[must_use]
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Absent => ImageKind::Absent,
            Self::Inline => ImageKind::Inline,
            Self::File { .. } => ImageKind::File,
            Self::Unknown(_) => ImageKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Absent,
    Inline,
    File,
    Unknown,
}

fn has_image_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_inline_payloads() {
        assert_eq!(
            ImageRef::classify(Some("data:image/png;base64,AAA")),
            ImageRef::Inline
        );
    }

    #[test]
    fn classifies_upload_paths_with_bare_name() {
        assert_eq!(
            ImageRef::classify(Some("uploads/missing.png")),
            ImageRef::File {
                stored: "uploads/missing.png",
                file_name: "missing.png"
            }
        );
        assert_eq!(
            ImageRef::classify(Some("C:\\site\\uploads\\a.JPG")),
            ImageRef::File {
                stored: "C:\\site\\uploads\\a.JPG",
                file_name: "a.JPG"
            }
        );
        assert_eq!(
            ImageRef::classify(Some("1700000000-portrait.webp")).kind(),
            ImageKind::File
        );
    }

    #[test]
    fn absent_and_unknown_values() {
        assert_eq!(ImageRef::classify(None), ImageRef::Absent);
        assert_eq!(ImageRef::classify(Some("  ")), ImageRef::Absent);
        assert_eq!(
            ImageRef::classify(Some("https://cdn.example.org/a.png")).kind(),
            ImageKind::Unknown
        );
        assert_eq!(
            ImageRef::classify(Some("portrait")).kind(),
            ImageKind::Unknown
        );
        assert_eq!(
            ImageRef::classify(Some("uploads/..")).kind(),
            ImageKind::Unknown
        );
    }
}
