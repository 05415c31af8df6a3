use std::ptr::{self, NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

use crate::{
  block::Block,
  error::Corruption,
  tag::{BlockState, OVERHEAD, TAG_WIDTH, Tag},
};

/// Where the heap region comes from.
///
/// # Safety
///
/// A pointer returned by [`acquire`](HeapSource::acquire) must be valid for
/// reads and writes of `capacity` bytes and must not be used by anything else
/// until it is handed back through [`release`](HeapSource::release).
pub unsafe trait HeapSource {
  fn acquire(
    &mut self,
    capacity: usize,
  ) -> Option<NonNull<u8>>;

  /// # Safety
  ///
  /// `base` and `capacity` must come from a previous successful `acquire` on
  /// this source, and no pointer into the region may be used afterwards.
  unsafe fn release(
    &mut self,
    base: NonNull<u8>,
    capacity: usize,
  );
}

/// Anonymous private mapping obtained from the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapSource;

unsafe impl HeapSource for MmapSource {
  fn acquire(
    &mut self,
    capacity: usize,
  ) -> Option<NonNull<u8>> {
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        capacity,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return None;
    }

    NonNull::new(address as *mut u8)
  }

  unsafe fn release(
    &mut self,
    base: NonNull<u8>,
    capacity: usize,
  ) {
    unsafe {
      munmap(base.as_ptr() as *mut c_void, capacity);
    }
  }
}

/// The acquired heap region. Every metadata access is addressed by offset and
/// checked against the capacity before memory is touched.
pub struct Region {
  base: NonNull<u8>,
  capacity: usize,
}

impl Region {
  /// Takes over `capacity` bytes at `base` and formats them as one free block.
  ///
  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `capacity` bytes for as long
  /// as the region lives.
  pub unsafe fn init(
    base: NonNull<u8>,
    capacity: usize,
  ) -> Result<Self, Corruption> {
    let size = capacity
      .checked_sub(OVERHEAD)
      .ok_or(Corruption::BlockOverrun { offset: 0, size: capacity })?;

    let mut region = Self { base, capacity };
    region.write_tags(0, size, BlockState::Free)?;
    Ok(region)
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  fn check_tag(
    &self,
    offset: usize,
  ) -> Result<(), Corruption> {
    match offset.checked_add(TAG_WIDTH) {
      Some(end) if end <= self.capacity => Ok(()),
      _ => Err(Corruption::TagOutOfBounds { offset }),
    }
  }

  pub fn read_tag(
    &self,
    offset: usize,
  ) -> Result<Tag, Corruption> {
    self.check_tag(offset)?;
    let raw = unsafe { ptr::read_unaligned(self.base.as_ptr().add(offset) as *const u32) };
    Ok(Tag::from_raw(raw))
  }

  fn write_tag(
    &mut self,
    offset: usize,
    tag: Tag,
  ) -> Result<(), Corruption> {
    self.check_tag(offset)?;
    unsafe { ptr::write_unaligned(self.base.as_ptr().add(offset) as *mut u32, tag.into_raw()) };
    Ok(())
  }

  /// Frames a block starting at `start` with identical header and footer tags.
  pub fn write_tags(
    &mut self,
    start: usize,
    size: usize,
    state: BlockState,
  ) -> Result<(), Corruption> {
    let block = Block::new(start, size, state);
    if block.end() > self.capacity {
      return Err(Corruption::BlockOverrun { offset: start, size });
    }

    let tag = Tag::encode(size, state);
    self.write_tag(start, tag)?;
    self.write_tag(block.footer_offset(), tag)
  }

  /// Decodes the block whose header sits at `start`, checking that it fits in
  /// the region and that its footer matches.
  pub fn read_block(
    &self,
    start: usize,
  ) -> Result<Block, Corruption> {
    let header = self.read_tag(start)?;
    let (size, state) = header.decode();
    let block = Block::new(start, size, state);

    if block.end() > self.capacity {
      return Err(Corruption::BlockOverrun { offset: start, size });
    }

    let footer = self.read_tag(block.footer_offset())?;
    if footer != header {
      return Err(Corruption::TagMismatch {
        offset: start,
        header: header.into_raw(),
        footer: footer.into_raw(),
      });
    }

    Ok(block)
  }

  /// Decodes the block whose footer ends right before `end`.
  pub fn read_block_before(
    &self,
    end: usize,
  ) -> Result<Block, Corruption> {
    let footer_offset = end
      .checked_sub(TAG_WIDTH)
      .ok_or(Corruption::TagOutOfBounds { offset: end })?;
    let footer = self.read_tag(footer_offset)?;

    let start = footer_offset
      .checked_sub(footer.size() + TAG_WIDTH)
      .ok_or(Corruption::BlockOverrun { offset: footer_offset, size: footer.size() })?;

    self.read_block(start)
  }

  pub fn payload_ptr(
    &self,
    block: &Block,
  ) -> NonNull<u8> {
    unsafe { self.base.add(block.payload_offset()) }
  }

  /// Maps a payload pointer back to the offset of its block header, if the
  /// pointer lies inside the region at all.
  pub fn header_offset(
    &self,
    payload: NonNull<u8>,
  ) -> Option<usize> {
    let offset = (payload.as_ptr() as usize).checked_sub(self.base.as_ptr() as usize)?;

    if offset >= self.capacity {
      return None;
    }

    offset.checked_sub(TAG_WIDTH)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn with_region<F: FnOnce(&mut Region)>(
    capacity: usize,
    f: F,
  ) {
    let mut source = MmapSource;
    let base = source.acquire(capacity).unwrap();
    let mut region = unsafe { Region::init(base, capacity) }.unwrap();

    f(&mut region);

    unsafe { source.release(base, capacity) };
  }

  #[test]
  fn test_init_formats_single_free_block() {
    with_region(4096, |region| {
      let block = region.read_block(0).unwrap();
      assert_eq!(block, Block::new(0, 4096 - OVERHEAD, BlockState::Free));
      assert_eq!(block.end(), region.capacity());
    });
  }

  #[test]
  fn test_write_tags_places_header_and_footer() {
    with_region(128, |region| {
      region.write_tags(0, 32, BlockState::InUse).unwrap();

      assert_eq!(region.read_tag(0).unwrap(), Tag::encode(32, BlockState::InUse));
      assert_eq!(region.read_tag(36).unwrap(), Tag::encode(32, BlockState::InUse));
    });
  }

  #[test]
  fn test_tag_reads_are_bounds_checked() {
    with_region(64, |region| {
      assert_eq!(region.read_tag(60).map(|_| ()), Ok(()));
      assert_eq!(region.read_tag(61), Err(Corruption::TagOutOfBounds { offset: 61 }));
      assert_eq!(
        region.read_tag(usize::MAX),
        Err(Corruption::TagOutOfBounds { offset: usize::MAX })
      );
    });
  }

  #[test]
  fn test_oversized_block_is_rejected() {
    with_region(64, |region| {
      assert_eq!(
        region.write_tags(16, 48, BlockState::Free),
        Err(Corruption::BlockOverrun { offset: 16, size: 48 })
      );
    });
  }

  #[test]
  fn test_mismatched_footer_is_detected() {
    with_region(64, |region| {
      region.write_tags(0, 16, BlockState::InUse).unwrap();
      region.write_tag(20, Tag::encode(16, BlockState::Free)).unwrap();

      assert_eq!(
        region.read_block(0),
        Err(Corruption::TagMismatch { offset: 0, header: 16, footer: 0x8000_0010 })
      );
    });
  }

  #[test]
  fn test_read_block_before_walks_backwards() {
    with_region(64, |region| {
      region.write_tags(0, 16, BlockState::InUse).unwrap();
      region.write_tags(24, 32, BlockState::Free).unwrap();

      assert_eq!(region.read_block_before(24).unwrap(), Block::new(0, 16, BlockState::InUse));
      assert_eq!(region.read_block_before(64).unwrap(), Block::new(24, 32, BlockState::Free));
      assert_eq!(region.read_block_before(0), Err(Corruption::TagOutOfBounds { offset: 0 }));
    });
  }

  #[test]
  fn test_header_offset_rejects_outside_pointers() {
    with_region(64, |region| {
      let base = region.base();

      assert_eq!(region.header_offset(unsafe { base.add(4) }), Some(0));
      assert_eq!(region.header_offset(base), None);
      assert_eq!(region.header_offset(unsafe { base.add(64) }), None);
    });
  }
}
