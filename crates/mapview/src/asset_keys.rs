use thiserror::Error;

/// Problems with a texture or shader key such as `ui/crosshair/default`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetKeyError {
    #[error("asset key must not be empty")]
    Empty,
    #[error("asset key must not start with '/'")]
    LeadingSlash,
    #[error("asset key must not end with '/'")]
    TrailingSlash,
    #[error("asset key must not contain '\\\\'")]
    Backslash,
    #[error("asset key must not contain '..'")]
    ParentTraversal,
    #[error("asset key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys are relative, lowercase, slash-separated and extension-less; hosts append
/// their own root and file extension.
pub fn validate_asset_key(key: &str) -> Result<(), AssetKeyError> {
    if key.is_empty() {
        return Err(AssetKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(AssetKeyError::LeadingSlash);
    }
    if key.ends_with('/') {
        return Err(AssetKeyError::TrailingSlash);
    }
    if key.contains('\\') {
        return Err(AssetKeyError::Backslash);
    }
    if key.contains("..") {
        return Err(AssetKeyError::ParentTraversal);
    }
    match key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        Some(character) => Err(AssetKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_texture_and_shader_keys() {
        for key in ["ui/crosshair/default", "map_default", "shaders/map-party_2"] {
            assert!(validate_asset_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_paths_that_escape_or_carry_extensions() {
        assert_eq!(validate_asset_key(""), Err(AssetKeyError::Empty));
        assert_eq!(validate_asset_key("/abs"), Err(AssetKeyError::LeadingSlash));
        assert_eq!(validate_asset_key("ui/"), Err(AssetKeyError::TrailingSlash));
        assert_eq!(validate_asset_key(r"ui\x"), Err(AssetKeyError::Backslash));
        assert_eq!(validate_asset_key("ui/../x"), Err(AssetKeyError::ParentTraversal));
        assert_eq!(
            validate_asset_key("crosshair.png"),
            Err(AssetKeyError::InvalidCharacter { character: '.' })
        );
        assert_eq!(
            validate_asset_key("Crosshair"),
            Err(AssetKeyError::InvalidCharacter { character: 'C' })
        );
    }
}
