//! Address domain and persisted layout constants.
//!
//! The width of an address (and of a node index) is a single build-time
//! choice: the `ea64` feature selects 64-bit addresses, otherwise 32-bit.
//! Every store instance written by a build uses that width throughout.

#[cfg(feature = "ea64")]
mod width {
    /// Linear address in the analysed program
    pub type Address = u64;
    /// Signed distance between two addresses
    pub type AddressDiff = i64;
}

#[cfg(not(feature = "ea64"))]
mod width {
    /// Linear address in the analysed program
    pub type Address = u32;
    /// Signed distance between two addresses
    pub type AddressDiff = i32;
}

pub use width::{Address, AddressDiff};

/// Numeric node identifier. Same width as an address so that every address
/// has a node of its own.
pub type NodeIndex = Address;

/// Size in bytes of an encoded address / node index
pub const ADDRESS_BYTES: usize = std::mem::size_of::<Address>();

/// "No address" sentinel of the persisted contract
pub const BADADDR: Address = Address::MAX;

/// "No node" sentinel of the persisted contract
pub const BADNODE: NodeIndex = NodeIndex::MAX;

/// Maximum node name length in bytes
pub const MAX_NAME_SIZE: usize = 512;

/// Maximum size of a single sup / hash / node value in bytes
pub const MAX_SPEC_SIZE: usize = 1024;

/// Maximum size of an interval comment in bytes
pub const MAX_COMMENT_SIZE: usize = 4096;

/// First id handed out to nodes created without an explicit id
pub const FIRST_AUTO_NODE: NodeIndex = 0xFF << (Address::BITS - 8);

/// Truncate `text` to at most `max` bytes without splitting a character.
pub(crate) fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
