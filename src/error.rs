use std::{error, fmt};

/// Metadata found in an impossible state while walking the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
  /// A tag read at `offset` would fall outside the region.
  TagOutOfBounds { offset: usize },
  /// The header at `offset` and its footer disagree.
  TagMismatch { offset: usize, header: u32, footer: u32 },
  /// The block at `offset` claims to extend past the end of the region.
  BlockOverrun { offset: usize, size: usize },
  /// The free block at `offset` is directly followed by another free block.
  AdjacentFree { offset: usize },
}

impl fmt::Display for Corruption {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match *self {
      Corruption::TagOutOfBounds { offset } => {
        write!(f, "tag at offset {offset} lies outside the heap region")
      }
      Corruption::TagMismatch { offset, header, footer } => write!(
        f,
        "block at offset {offset} has header {header:#010x} but footer {footer:#010x}"
      ),
      Corruption::BlockOverrun { offset, size } => {
        write!(f, "block at offset {offset} of {size} bytes overruns the heap region")
      }
      Corruption::AdjacentFree { offset } => {
        write!(f, "free block at offset {offset} is followed by another free block")
      }
    }
  }
}

impl error::Error for Corruption {}

/// Reasons an allocation request can fail. No heap state is changed when one
/// of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The request is larger than the whole heap could ever provide.
  CapacityExceeded { requested: usize, max: usize },
  /// No free block is currently large enough.
  OutOfSpace { requested: usize },
  /// The one-time acquisition of the heap region failed.
  BackingStoreUnavailable,
  Corrupt(Corruption),
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      AllocError::CapacityExceeded { requested, max } => {
        write!(f, "request of {requested} bytes exceeds the heap maximum of {max} bytes")
      }
      AllocError::OutOfSpace { requested } => {
        write!(f, "no free block can hold {requested} bytes")
      }
      AllocError::BackingStoreUnavailable => f.write_str("heap region could not be acquired"),
      AllocError::Corrupt(corruption) => write!(f, "heap metadata corrupted: {corruption}"),
    }
  }
}

impl error::Error for AllocError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      AllocError::Corrupt(corruption) => Some(corruption),
      _ => None,
    }
  }
}

impl From<Corruption> for AllocError {
  fn from(corruption: Corruption) -> Self {
    AllocError::Corrupt(corruption)
  }
}

/// Reasons a deallocation is refused. The heap is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
  /// The pointer was not handed out by this heap.
  ForeignPointer,
  /// The block behind the pointer is already free.
  DoubleFree,
  Corrupt(Corruption),
}

impl fmt::Display for FreeError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      FreeError::ForeignPointer => f.write_str("pointer does not belong to an allocated block"),
      FreeError::DoubleFree => f.write_str("block is already free"),
      FreeError::Corrupt(corruption) => write!(f, "heap metadata corrupted: {corruption}"),
    }
  }
}

impl error::Error for FreeError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      FreeError::Corrupt(corruption) => Some(corruption),
      _ => None,
    }
  }
}

impl From<Corruption> for FreeError {
  fn from(corruption: Corruption) -> Self {
    FreeError::Corrupt(corruption)
  }
}

/// Rejected heap capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
  TooSmall { capacity: usize, min: usize },
  TooLarge { capacity: usize, max: usize },
  Misaligned { capacity: usize, align: usize },
}

impl fmt::Display for ConfigError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ConfigError::TooSmall { capacity, min } => {
        write!(f, "heap capacity {capacity} is below the minimum of {min} bytes")
      }
      ConfigError::TooLarge { capacity, max } => {
        write!(f, "heap capacity {capacity} is above the maximum of {max} bytes")
      }
      ConfigError::Misaligned { capacity, align } => {
        write!(f, "heap capacity {capacity} is not a multiple of {align}")
      }
    }
  }
}

impl error::Error for ConfigError {}
