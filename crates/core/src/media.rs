//! Product-scoped media preloaded during a handoff.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Maximum length of a product-side media identifier.
pub const MAX_EXTERNAL_ID_LENGTH: usize = 255;

/// Maximum serialized size of the free-form metadata object.
pub const MAX_METADATA_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Gif,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Gif => "gif",
            MediaType::Document => "document",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "gif" => Ok(MediaType::Gif),
            "document" => Ok(MediaType::Document),
            other => Err(CoreError::Validation(format!("Unknown media type: '{other}'"))),
        }
    }
}

/// A media item as described by the external product.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaDescriptor {
    pub external_id: String,
    pub media_type: String,
    pub url: String,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A descriptor that passed validation.
#[derive(Debug, Clone)]
pub struct ValidMedia {
    pub external_id: String,
    pub media_type: MediaType,
    pub url: String,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata: serde_json::Value,
}

fn check_http_url(field: &str, raw: &str) -> Result<String, CoreError> {
    let url = Url::parse(raw)
        .map_err(|e| CoreError::Validation(format!("Invalid {field} '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(CoreError::Validation(format!(
            "{field} scheme '{scheme}' is not allowed"
        ))),
    }
}

impl MediaDescriptor {
    pub fn validate(&self) -> Result<ValidMedia, CoreError> {
        let external_id = self.external_id.trim();
        if external_id.is_empty() || external_id.len() > MAX_EXTERNAL_ID_LENGTH {
            return Err(CoreError::Validation(format!(
                "Media external_id must be 1-{MAX_EXTERNAL_ID_LENGTH} characters"
            )));
        }

        let media_type = self.media_type.parse::<MediaType>()?;
        let url = check_http_url("media url", &self.url)?;
        let thumbnail_url = self
            .thumbnail_url
            .as_deref()
            .map(|raw| check_http_url("thumbnail url", raw))
            .transpose()?;

        let metadata = match &self.metadata {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(value @ serde_json::Value::Object(_)) => {
                let size = serde_json::to_vec(value)
                    .map_err(|e| CoreError::Validation(format!("Invalid media metadata: {e}")))?
                    .len();
                if size > MAX_METADATA_BYTES {
                    return Err(CoreError::Validation(format!(
                        "Media metadata exceeds {MAX_METADATA_BYTES} bytes"
                    )));
                }
                value.clone()
            }
            Some(_) => {
                return Err(CoreError::Validation(
                    "Media metadata must be a JSON object".into(),
                ))
            }
        };

        Ok(ValidMedia {
            external_id: external_id.to_string(),
            media_type,
            url,
            name: self.name.as_ref().map(|n| n.trim().to_string()),
            thumbnail_url,
            metadata,
        })
    }
}

/// Validate a preload batch: size bound, per-item rules, unique external ids.
pub fn validate_preload(
    items: &[MediaDescriptor],
    max_items: usize,
) -> Result<Vec<ValidMedia>, CoreError> {
    if items.len() > max_items {
        return Err(CoreError::Validation(format!(
            "At most {max_items} media items may be preloaded, got {}",
            items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(|item| {
            let valid = item.validate()?;
            if !seen.insert(valid.external_id.clone()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate media external_id '{}'",
                    valid.external_id
                )));
            }
            Ok(valid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn descriptor(id: &str) -> MediaDescriptor {
        MediaDescriptor {
            external_id: id.to_string(),
            media_type: "image".to_string(),
            url: "https://cdn.example.com/a.png".to_string(),
            name: Some(" Cover ".to_string()),
            thumbnail_url: None,
            metadata: Some(json!({ "width": 1080 })),
        }
    }

    #[test]
    fn valid_descriptor_is_normalized() {
        let valid = descriptor("m-1").validate().unwrap();
        assert_eq!(valid.media_type, MediaType::Image);
        assert_eq!(valid.name.as_deref(), Some("Cover"));
        assert_eq!(valid.metadata["width"], 1080);
    }

    #[test]
    fn missing_metadata_becomes_empty_object() {
        let mut item = descriptor("m-1");
        item.metadata = None;
        let valid = item.validate().unwrap();
        assert!(valid.metadata.as_object().unwrap().is_empty());
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut item = descriptor("m-1");
        item.url = "ftp://cdn.example.com/a.png".to_string();
        assert_matches!(item.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_non_object_metadata() {
        let mut item = descriptor("m-1");
        item.metadata = Some(json!([1, 2, 3]));
        assert_matches!(item.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_oversized_metadata() {
        let mut item = descriptor("m-1");
        item.metadata = Some(json!({ "blob": "x".repeat(MAX_METADATA_BYTES) }));
        assert_matches!(item.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_limit_is_enforced() {
        let items = vec![descriptor("a"), descriptor("b"), descriptor("c")];
        assert!(validate_preload(&items, 3).is_ok());
        assert_matches!(validate_preload(&items, 2), Err(CoreError::Validation(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let items = vec![descriptor("a"), descriptor(" a ")];
        let err = validate_preload(&items, 10).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("Duplicate"));
    }

    #[test]
    fn media_type_parse_is_case_insensitive() {
        assert_eq!("VIDEO".parse::<MediaType>().unwrap(), MediaType::Video);
        assert!("audio".parse::<MediaType>().is_err());
    }
}
