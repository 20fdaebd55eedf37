//! Target memory address type.

use std::fmt;
use std::ops::Add;

use crate::error::{ModelError, ModelResult};

/// Strongly typed target address
///
/// Wraps a `u64` so breakpoint locations, lengths and ids cannot be mixed up
/// at call sites. The value is an address in the *target's* address space as
/// reported by the backend; no validation against the target's memory map is
/// done here.
///
/// ## Example
///
/// ```rust
/// use tether_core::types::Address;
///
/// let addr = Address::parse_hex("0x401000")?;
/// assert_eq!(addr.value(), 0x40_1000);
/// assert_eq!((addr + 4).to_string(), "0x0000000000401004");
/// # Ok::<(), tether_core::error::ModelError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address
    pub const ZERO: Self = Address(0);

    /// Create an address in const contexts.
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw value, for handing to a backend driver.
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Parse a hexadecimal address.
    ///
    /// Accepts an optional `0x`/`0X` prefix and surrounding whitespace. Digits
    /// beyond 64 bits are rejected rather than truncated.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if the text is empty, contains non-hex digits, or
    /// overflows 64 bits.
    pub fn parse_hex(text: &str) -> ModelResult<Self>
    {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ModelError::InvalidArgument(format!("empty address: {text:?}")));
        }
        u64::from_str_radix(digits, 16)
            .map(Address)
            .map_err(|err| ModelError::InvalidArgument(format!("bad hex address {text:?}: {err}")))
    }

    /// Add an offset, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Whether `[self, self + len)` contains `other`.
    #[must_use]
    pub fn range_contains(self, len: u64, other: Address) -> bool
    {
        other.0 >= self.0 && other.0 - self.0 < len
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_hex_accepts_prefix_and_bare_digits()
    {
        assert_eq!(Address::parse_hex("0x401000").unwrap(), Address::new(0x40_1000));
        assert_eq!(Address::parse_hex("401000").unwrap(), Address::new(0x40_1000));
        assert_eq!(Address::parse_hex(" 0XfF ").unwrap(), Address::new(0xff));
    }

    #[test]
    fn test_parse_hex_rejects_garbage()
    {
        assert!(matches!(Address::parse_hex("main"), Err(ModelError::InvalidArgument(_))));
        assert!(matches!(Address::parse_hex("0x"), Err(ModelError::InvalidArgument(_))));
        assert!(Address::parse_hex("0x1_0000_0000_0000_0000").is_err());
        assert!(Address::parse_hex("10000000000000000").is_err());
    }

    #[test]
    fn test_range_contains()
    {
        let base = Address::new(0x1000);
        assert!(base.range_contains(4, Address::new(0x1003)));
        assert!(!base.range_contains(4, Address::new(0x1004)));
        assert!(!base.range_contains(4, Address::new(0xfff)));
    }
}
