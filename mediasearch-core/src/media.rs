//! Input validation for refs, namespaces, mime types and media URLs.
//!
//! Everything user-supplied that reaches a store predicate or the filesystem
//! passes through here first.

use url::Url;

use crate::error::{MediaSearchError, Result};
use crate::model::MediaClass;

/// Subtypes accepted for the `image` class.
pub const IMAGE_SUBTYPES: &[&str] = &[
    "png", "jpg", "jpeg", "pjpeg", "gif", "bmp", "x-ms-bmp", "tiff",
];

/// Maximum accepted length of a ref or namespace component.
pub const MAX_NAME_LENGTH: usize = 255;

fn is_ref_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ',' | '-')
}

fn is_namespace_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// `ref` must match `[A-Za-z0-9_.,-]+`.
pub fn validate_ref(reference: &str) -> Result<()> {
    if reference.is_empty() {
        return Err(MediaSearchError::validation("ref is required"));
    }
    if reference.len() > MAX_NAME_LENGTH {
        return Err(MediaSearchError::validation(format!(
            "ref exceeds {MAX_NAME_LENGTH} characters"
        )));
    }
    if !reference.chars().all(is_ref_char) {
        return Err(MediaSearchError::validation(format!(
            "invalid ref: {reference}"
        )));
    }
    Ok(())
}

/// Provider and archive names must match `[A-Za-z0-9_-]+`.
pub fn validate_namespace(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH || !name.chars().all(is_namespace_char) {
        return Err(MediaSearchError::validation(format!(
            "invalid {kind}: {name}"
        )));
    }
    Ok(())
}

/// Splits `class/subtype` and checks the subtype against the class
/// allow-list. Only images have one.
pub fn parse_mime(mime: &str) -> Result<MediaClass> {
    let (class, subtype) = mime
        .split_once('/')
        .ok_or_else(|| MediaSearchError::validation(format!("invalid mime type: {mime}")))?;
    let class: MediaClass = class.parse()?;

    let allowed: &[&str] = match class {
        MediaClass::Image => IMAGE_SUBTYPES,
        MediaClass::Video | MediaClass::Audio => &[],
    };
    if !allowed.contains(&subtype) {
        return Err(MediaSearchError::validation(format!(
            "unsupported mime type: {mime}"
        )));
    }
    Ok(class)
}

/// A media location with an accepted scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUrl {
    /// Path as written after `file:` with any leading `//` stripped.
    File(String),
    Remote(Url),
}

impl MediaUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("file:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(MediaSearchError::validation("empty file path"));
            }
            return Ok(Self::File(path.to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| MediaSearchError::validation(format!("invalid url {raw}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            scheme => Err(MediaSearchError::validation(format!(
                "unsupported url scheme: {scheme}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ref() {
        assert!(validate_ref("img1").is_ok());
        assert!(validate_ref("a.b,c_d-e").is_ok());
        assert!(validate_ref("").is_err());
        assert!(validate_ref("img 1").is_err());
        assert!(validate_ref("x'; drop").is_err());
        assert!(validate_ref("$where").is_err());
        assert!(validate_ref(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(validate_ref(&"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("provider", "acme").is_ok());
        assert!(validate_namespace("archive", "my_photos-2").is_ok());
        assert!(validate_namespace("archive", "a.b").is_err());
        assert!(validate_namespace("archive", "").is_err());
    }

    #[test]
    fn test_parse_mime() {
        assert_eq!(parse_mime("image/png").unwrap(), MediaClass::Image);
        assert_eq!(parse_mime("image/x-ms-bmp").unwrap(), MediaClass::Image);
        assert!(parse_mime("image/webp").is_err());
        assert!(parse_mime("video/mp4").is_err());
        assert!(parse_mime("text/plain").is_err());
        assert!(parse_mime("png").is_err());
    }

    #[test]
    fn test_parse_url_schemes() {
        assert_eq!(
            MediaUrl::parse("file:///tmp/a.png").unwrap(),
            MediaUrl::File("/tmp/a.png".to_string())
        );
        assert_eq!(
            MediaUrl::parse("file:photos/a.png").unwrap(),
            MediaUrl::File("photos/a.png".to_string())
        );
        assert!(matches!(
            MediaUrl::parse("https://example.com/a.png").unwrap(),
            MediaUrl::Remote(_)
        ));
        assert!(MediaUrl::parse("ftp://example.com/a.png").is_err());
        assert!(MediaUrl::parse("not a url").is_err());
    }
}
