use crate::tag::{BlockState, OVERHEAD, TAG_WIDTH};

/// A block as seen from outside: where its header sits in the region, how many
/// payload bytes it carries and whether it is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub offset: usize,
  pub size: usize,
  pub state: BlockState,
}

impl Block {
  pub fn new(
    offset: usize,
    size: usize,
    state: BlockState,
  ) -> Self {
    Self { offset, size, state }
  }

  pub fn is_free(&self) -> bool {
    self.state == BlockState::Free
  }

  pub fn payload_offset(&self) -> usize {
    self.offset + TAG_WIDTH
  }

  pub fn footer_offset(&self) -> usize {
    self.offset + TAG_WIDTH + self.size
  }

  /// Offset of the header of the following block.
  pub fn end(&self) -> usize {
    self.offset + OVERHEAD + self.size
  }

  /// Bytes of the region this block occupies, tags included.
  pub fn span(&self) -> usize {
    self.size + OVERHEAD
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_block_geometry() {
    let block = Block::new(40, 64, BlockState::InUse);

    assert_eq!(block.payload_offset(), 44);
    assert_eq!(block.footer_offset(), 108);
    assert_eq!(block.end(), 112);
    assert_eq!(block.span(), 72);
    assert!(!block.is_free());
  }
}
