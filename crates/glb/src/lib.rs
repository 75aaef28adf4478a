//! Binary glTF (GLB) signature validation.
//!
//! This crate answers one question about a downloaded byte buffer: is it
//! plausibly a GLB container that a 3D viewer can open? It checks the minimum
//! size and the four-byte `glTF` magic, and exposes the rest of the 12-byte
//! header for diagnostics.
//!
//! # Example
//!
//! ```
//! use photomesh_glb::{validate, ValidationError};
//!
//! let mut bytes = b"glTF".to_vec();
//! bytes.extend_from_slice(&2u32.to_le_bytes());
//! bytes.extend_from_slice(&128u32.to_le_bytes());
//! bytes.resize(128, 0);
//!
//! let header = validate(&bytes).unwrap();
//! assert_eq!(header.version, 2);
//!
//! assert!(matches!(
//!     validate(b"PK\x03\x04"),
//!     Err(ValidationError::TooShort { .. })
//! ));
//! ```

mod header;

pub use header::GlbHeader;

use thiserror::Error;

/// Leading bytes of every binary glTF file (ASCII `glTF`).
pub const MAGIC: [u8; 4] = [0x67, 0x6C, 0x54, 0x46];

/// Smallest buffer accepted as a model. Anything shorter is treated as an
/// error page or a truncated transfer.
pub const MIN_ASSET_LEN: usize = 100;

/// File extension used when persisting a validated model.
pub const FILE_EXTENSION: &str = "glb";

/// Reasons a buffer is rejected as a GLB model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The buffer is shorter than [`MIN_ASSET_LEN`].
    #[error("asset is too small ({len} bytes, minimum {min})")]
    TooShort { len: usize, min: usize },

    /// The first four bytes are not the `glTF` magic.
    #[error("asset signature {found:02X?} is not binary glTF")]
    BadSignature { found: [u8; 4] },
}

/// Returns true if `bytes` starts with the GLB magic.
pub fn has_signature(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

/// Validate a downloaded buffer and return its parsed header.
///
/// Only the length floor and the magic are enforced. The version and declared
/// length are reported but never cause rejection; a mismatch between the
/// declared and actual length is logged at warn level.
pub fn validate(bytes: &[u8]) -> Result<GlbHeader, ValidationError> {
    if bytes.len() < MIN_ASSET_LEN {
        return Err(ValidationError::TooShort {
            len: bytes.len(),
            min: MIN_ASSET_LEN,
        });
    }

    if !has_signature(bytes) {
        let mut found = [0u8; 4];
        found.copy_from_slice(&bytes[..4]);
        return Err(ValidationError::BadSignature { found });
    }

    // Length floor guarantees 12 header bytes are present.
    let header = GlbHeader::parse(bytes).ok_or(ValidationError::TooShort {
        len: bytes.len(),
        min: MIN_ASSET_LEN,
    })?;

    if header.declared_length as usize != bytes.len() {
        log::warn!(
            "GLB header declares {} bytes but buffer holds {}",
            header.declared_length,
            bytes.len()
        );
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glb_bytes(len: usize) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&(len as u32).to_le_bytes());
        bytes.resize(len, 0);
        bytes
    }

    #[test]
    fn test_validate_accepts_minimum_length() {
        let header = validate(&glb_bytes(MIN_ASSET_LEN)).expect("100 bytes should pass");
        assert_eq!(header.version, 2);
        assert_eq!(header.declared_length, 100);
    }

    #[test]
    fn test_validate_rejects_short_buffers() {
        let test_cases = vec![
            ("empty buffer", Vec::new()),
            ("magic only", MAGIC.to_vec()),
            ("one byte under the floor", glb_bytes(MIN_ASSET_LEN - 1)),
        ];

        for (description, bytes) in test_cases {
            let len = bytes.len();
            assert_eq!(
                validate(&bytes),
                Err(ValidationError::TooShort {
                    len,
                    min: MIN_ASSET_LEN
                }),
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_validate_rejects_wrong_signature() {
        let test_cases = vec![
            ("zip archive", *b"PK\x03\x04"),
            ("html error page", *b"<!DO"),
            ("lowercase magic", *b"gltf"),
        ];

        for (description, magic) in test_cases {
            let mut bytes = glb_bytes(256);
            bytes[..4].copy_from_slice(&magic);
            assert_eq!(
                validate(&bytes),
                Err(ValidationError::BadSignature { found: magic }),
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_length_mismatch_is_not_fatal() {
        let mut bytes = glb_bytes(200);
        bytes[8..12].copy_from_slice(&999u32.to_le_bytes());
        let header = validate(&bytes).expect("declared length is informational");
        assert_eq!(header.declared_length, 999);
    }

    #[test]
    fn test_has_signature() {
        assert!(has_signature(b"glTF"));
        assert!(!has_signature(b"glT"));
        assert!(!has_signature(b"GLTF...."));
    }
}
