//! The fixed 12-byte GLB header.

/// Header fields that follow the magic, little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    /// Container version. Version 2 is the only one in current use.
    pub version: u32,

    /// Total file length as declared by the writer.
    pub declared_length: u32,
}

impl GlbHeader {
    /// Size of the header in bytes, magic included.
    pub const LEN: usize = 12;

    /// Parse the header from the start of `bytes`.
    ///
    /// Returns `None` if fewer than [`GlbHeader::LEN`] bytes are available.
    /// The magic itself is not checked here.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LEN {
            return None;
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let declared_length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        Some(Self {
            version,
            declared_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_little_endian_fields() {
        let bytes = [
            b'g', b'l', b'T', b'F', 0x02, 0x00, 0x00, 0x00, 0x10, 0x27, 0x00, 0x00,
        ];
        let header = GlbHeader::parse(&bytes).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.declared_length, 10_000);
    }

    #[test]
    fn test_parse_requires_full_header() {
        assert_eq!(GlbHeader::parse(b"glTF\x02\x00\x00\x00"), None);
    }
}
