use crate::constants::MAX_KEY_LENGTH;
use crate::errors::KeyError;

/// Enforce the transport's key-format constraints before submission: keys
/// are non-empty, at most 250 bytes, and free of whitespace and control
/// characters.
pub(crate) fn validate_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(KeyError::TooLong {
            len: key.len(),
            max: MAX_KEY_LENGTH,
        });
    }
    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(KeyError::InvalidCharacters);
    }
    Ok(())
}
