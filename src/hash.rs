//! Content hashing for inline templates
//!
//! The hash is the cache key of the compilation cache, so it must be stable
//! across builds and across instances for the same text.

/// A stable string-hash primitive
pub trait ContentHasher {
    /// Hash `text` into a printable digest
    fn hash(&self, text: &str) -> String;
}

/// 32-bit FNV-1a over UTF-16 code units, rendered as 8 lowercase hex digits
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv1a32;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

impl ContentHasher for Fnv1a32 {
    fn hash(&self, text: &str) -> String {
        hash_fnv32a(text)
    }
}

/// Hash text with FNV-1a (32-bit)
pub fn hash_fnv32a(text: &str) -> String {
    let value = text.encode_utf16().fold(FNV_OFFSET_BASIS, |hval, unit| {
        (hval ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    });
    format!("{:08x}", value)
}
