use std::ptr::NonNull;

use log::{debug, trace, warn};

use crate::{
  align,
  block::Block,
  error::{AllocError, ConfigError, Corruption, FreeError},
  region::{HeapSource, MmapSource, Region},
  tag::{BlockState, MAX_BLOCK_SIZE, OVERHEAD, TAG_WIDTH},
};

/// Capacity of a heap built with [`Heap::new`].
pub const HEAP_CAPACITY: usize = 4096;

/// Smallest capacity that still leaves room for a split.
pub const MIN_CAPACITY: usize = 2 * OVERHEAD;

/// A free block is handed out whole, without splitting, when it exceeds the
/// request by at most this many bytes.
pub const SPLIT_THRESHOLD: usize = OVERHEAD;

enum Store {
  Pending,
  Ready(Region),
  Unavailable,
}

/// Totals gathered by [`Heap::check`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub capacity: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub used_bytes: usize,
  pub largest_free: usize,
}

pub struct Heap<S: HeapSource = MmapSource> {
  source: S,
  capacity: usize,
  store: Store,
}

impl Heap<MmapSource> {
  pub fn new() -> Self {
    Self {
      source: MmapSource,
      capacity: HEAP_CAPACITY,
      store: Store::Pending,
    }
  }

  pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
    Self::with_source(MmapSource, capacity)
  }
}

impl Default for Heap<MmapSource> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: HeapSource> Heap<S> {
  pub fn with_source(
    source: S,
    capacity: usize,
  ) -> Result<Self, ConfigError> {
    if capacity < MIN_CAPACITY {
      return Err(ConfigError::TooSmall { capacity, min: MIN_CAPACITY });
    }
    if capacity - OVERHEAD > MAX_BLOCK_SIZE {
      return Err(ConfigError::TooLarge { capacity, max: MAX_BLOCK_SIZE + OVERHEAD });
    }
    if capacity % TAG_WIDTH != 0 {
      return Err(ConfigError::Misaligned { capacity, align: TAG_WIDTH });
    }

    Ok(Self {
      source,
      capacity,
      store: Store::Pending,
    })
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Largest request that can ever succeed: the payload of the initial block.
  pub fn max_request(&self) -> usize {
    self.capacity - OVERHEAD
  }

  pub fn is_acquired(&self) -> bool {
    matches!(self.store, Store::Ready(_))
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  fn region(&mut self) -> Result<&mut Region, AllocError> {
    if let Store::Pending = self.store {
      self.store = match self.source.acquire(self.capacity) {
        Some(base) => match unsafe { Region::init(base, self.capacity) } {
          Ok(region) => {
            debug!("acquired {} byte heap region at {:?}", self.capacity, base);
            Store::Ready(region)
          }
          Err(corruption) => {
            warn!("failed to format heap region: {}", corruption);
            unsafe { self.source.release(base, self.capacity) };
            Store::Unavailable
          }
        },
        None => {
          warn!("failed to acquire {} byte heap region", self.capacity);
          Store::Unavailable
        }
      };
    }

    match &mut self.store {
      Store::Ready(region) => Ok(region),
      _ => Err(AllocError::BackingStoreUnavailable),
    }
  }

  /// Hands out at least `size` usable bytes from the first free block that can
  /// hold them. The returned pointer stays valid until it is passed to
  /// [`deallocate`](Self::deallocate) or the heap is dropped.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let region = self.region()?;
    let max = region.capacity() - OVERHEAD;

    if size > max {
      return Err(AllocError::CapacityExceeded { requested: size, max });
    }

    let wanted = align!(size);
    let block = find_fit(region, wanted)?.ok_or(AllocError::OutOfSpace { requested: size })?;
    let placed = place(region, block, wanted)?;

    debug!(
      "allocate({}) -> offset {} ({} bytes)",
      size,
      placed.payload_offset(),
      placed.size
    );

    Ok(region.payload_ptr(&placed))
  }

  /// Returns a block to the heap and merges it with free neighbours.
  ///
  /// The pointer is validated first; foreign pointers, double frees and
  /// damaged tags are reported instead of corrupting the heap.
  pub fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), FreeError> {
    let Store::Ready(region) = &mut self.store else {
      warn!("deallocate({:?}) before the heap region was acquired", ptr);
      return Err(FreeError::ForeignPointer);
    };

    let Some(start) = region.header_offset(ptr) else {
      warn!("deallocate({:?}) outside the heap region", ptr);
      return Err(FreeError::ForeignPointer);
    };

    let block = find_block(region, start)?.ok_or_else(|| {
      warn!("deallocate({:?}) does not point at a block payload", ptr);
      FreeError::ForeignPointer
    })?;

    if block.is_free() {
      warn!("double free of block at offset {}", block.offset);
      return Err(FreeError::DoubleFree);
    }

    let merged = coalesce(region, block)?;

    debug!(
      "deallocate(offset {}) -> free block at offset {} ({} bytes)",
      block.payload_offset(),
      merged.offset,
      merged.size
    );

    Ok(())
  }

  /// Walks every block in address order. Nothing is yielded before the region
  /// has been acquired.
  pub fn blocks(&self) -> Blocks<'_> {
    match &self.store {
      Store::Ready(region) => Blocks { region: Some(region), offset: 0 },
      _ => Blocks { region: None, offset: 0 },
    }
  }

  /// Verifies that blocks tile the region exactly, every header matches its
  /// footer and no two free blocks touch.
  pub fn check(&self) -> Result<HeapStats, Corruption> {
    let mut stats = HeapStats {
      capacity: self.capacity,
      ..HeapStats::default()
    };
    let mut previous: Option<Block> = None;

    for block in self.blocks() {
      let block = block?;

      if let Some(prev) = previous
        && prev.is_free()
        && block.is_free()
      {
        return Err(Corruption::AdjacentFree { offset: prev.offset });
      }

      stats.blocks += 1;
      if block.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
        stats.largest_free = stats.largest_free.max(block.size);
      } else {
        stats.used_bytes += block.size;
      }

      previous = Some(block);
    }

    Ok(stats)
  }
}

impl<S: HeapSource> Drop for Heap<S> {
  fn drop(&mut self) {
    if let Store::Ready(region) = &self.store {
      unsafe { self.source.release(region.base(), region.capacity()) };
    }
  }
}

fn find_fit(
  region: &Region,
  size: usize,
) -> Result<Option<Block>, Corruption> {
  let mut offset = 0;

  while offset < region.capacity() {
    let block = region.read_block(offset)?;
    trace!("scan offset {}: {} bytes, {}", block.offset, block.size, block.state);

    if block.is_free() && block.size >= size {
      return Ok(Some(block));
    }

    offset = block.end();
  }

  Ok(None)
}

fn find_block(
  region: &Region,
  start: usize,
) -> Result<Option<Block>, Corruption> {
  let mut offset = 0;

  while offset <= start && offset < region.capacity() {
    let block = region.read_block(offset)?;

    if block.offset == start {
      return Ok(Some(block));
    }

    offset = block.end();
  }

  Ok(None)
}

/// Marks `block` in use, splitting off the tail as a new free block when the
/// slack is large enough to be worth its own tags.
fn place(
  region: &mut Region,
  block: Block,
  size: usize,
) -> Result<Block, Corruption> {
  let slack = block.size - size;

  if slack <= SPLIT_THRESHOLD {
    region.write_tags(block.offset, block.size, BlockState::InUse)?;
    return Ok(Block::new(block.offset, block.size, BlockState::InUse));
  }

  let used = Block::new(block.offset, size, BlockState::InUse);
  let rest = Block::new(used.end(), slack - OVERHEAD, BlockState::Free);

  region.write_tags(used.offset, used.size, used.state)?;
  region.write_tags(rest.offset, rest.size, rest.state)?;
  debug!("split offset {}: {} in use + {} free", block.offset, used.size, rest.size);

  Ok(used)
}

/// Frees `block` and folds in its successor and predecessor when they are free.
fn coalesce(
  region: &mut Region,
  block: Block,
) -> Result<Block, Corruption> {
  let mut merged = Block::new(block.offset, block.size, BlockState::Free);

  let next = if merged.end() < region.capacity() {
    Some(region.read_block(merged.end())?)
  } else {
    None
  };
  let prev = if merged.offset > 0 {
    Some(region.read_block_before(merged.offset)?)
  } else {
    None
  };

  if let Some(next) = next.filter(Block::is_free) {
    debug!("merge offset {} with next at {}", merged.offset, next.offset);
    merged.size += next.span();
  }

  if let Some(prev) = prev.filter(Block::is_free) {
    debug!("merge offset {} with previous at {}", merged.offset, prev.offset);
    merged.offset = prev.offset;
    merged.size += prev.span();
  }

  region.write_tags(merged.offset, merged.size, BlockState::Free)?;

  Ok(merged)
}

/// Iterator returned by [`Heap::blocks`].
pub struct Blocks<'a> {
  region: Option<&'a Region>,
  offset: usize,
}

impl Iterator for Blocks<'_> {
  type Item = Result<Block, Corruption>;

  fn next(&mut self) -> Option<Self::Item> {
    let region = self.region?;

    if self.offset >= region.capacity() {
      return None;
    }

    match region.read_block(self.offset) {
      Ok(block) => {
        self.offset = block.end();
        Some(Ok(block))
      }
      Err(corruption) => {
        self.region = None;
        Some(Err(corruption))
      }
    }
  }
}
