//! Boundary tag encoding.
//!
//! Every block is framed by two identical 32-bit words:
//!
//! ```text
//!   bit 31        bits 30..0
//!   ┌──────┬──────────────────────────────┐
//!   │ free │        payload size          │
//!   └──────┴──────────────────────────────┘
//! ```

use std::fmt;

/// Width in bytes of a single header or footer tag.
pub const TAG_WIDTH: usize = 4;

/// Metadata bytes carried by every block: one header and one footer.
pub const OVERHEAD: usize = 2 * TAG_WIDTH;

/// Largest payload size representable in a tag.
pub const MAX_BLOCK_SIZE: usize = SIZE_MASK as usize;

const FREE_BIT: u32 = 1 << 31;
const SIZE_MASK: u32 = !FREE_BIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
  Free,
  InUse,
}

impl fmt::Display for BlockState {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      BlockState::Free => f.write_str("free"),
      BlockState::InUse => f.write_str("in use"),
    }
  }
}

/// A raw metadata word as stored in the heap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(u32);

impl Tag {
  /// Packs `size` and `state` into a tag. `size` must not exceed
  /// [`MAX_BLOCK_SIZE`].
  pub fn encode(
    size: usize,
    state: BlockState,
  ) -> Self {
    debug_assert!(size <= MAX_BLOCK_SIZE, "block size {size} overflows tag");

    let flag = match state {
      BlockState::Free => FREE_BIT,
      BlockState::InUse => 0,
    };

    Self(flag | (size as u32 & SIZE_MASK))
  }

  pub fn decode(self) -> (usize, BlockState) {
    (self.size(), self.state())
  }

  pub fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub fn state(self) -> BlockState {
    if self.0 & FREE_BIT != 0 {
      BlockState::Free
    } else {
      BlockState::InUse
    }
  }

  pub fn from_raw(raw: u32) -> Self {
    Self(raw)
  }

  pub fn into_raw(self) -> u32 {
    self.0
  }
}

impl fmt::Display for Tag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#010x} ({} bytes, {})", self.0, self.size(), self.state())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flag_lives_in_high_bit() {
    assert_eq!(Tag::encode(0, BlockState::Free).into_raw(), 0x8000_0000);
    assert_eq!(Tag::encode(0, BlockState::InUse).into_raw(), 0);
    assert_eq!(Tag::encode(4088, BlockState::Free).into_raw(), 0x8000_0FF8);
    assert_eq!(Tag::encode(4088, BlockState::InUse).into_raw(), 0x0000_0FF8);
  }

  #[test]
  fn test_decode_reads_size_and_state() {
    assert_eq!(Tag::from_raw(0x8000_0020).decode(), (32, BlockState::Free));
    assert_eq!(Tag::from_raw(0x0000_0012).decode(), (18, BlockState::InUse));
  }

  #[test]
  fn test_size_bits_do_not_leak_into_flag() {
    let tag = Tag::encode(MAX_BLOCK_SIZE, BlockState::InUse);
    assert_eq!(tag.state(), BlockState::InUse);
    assert_eq!(tag.size(), MAX_BLOCK_SIZE);
  }

  #[test]
  fn test_display_shows_raw_word() {
    let tag = Tag::encode(32, BlockState::Free);
    assert_eq!(tag.to_string(), "0x80000020 (32 bytes, free)");
  }
}
