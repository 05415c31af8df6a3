//! # tagalloc - A Boundary Tag Heap Allocator
//!
//! This crate provides a fixed-capacity **first-fit heap allocator** that keeps
//! its bookkeeping in-band, as boundary tags framing every block, inside a
//! single region of memory obtained once from the operating system.
//!
//! ## Overview
//!
//! ```text
//!   Heap Region (4096 bytes):
//!
//!   ┌───┬──────────┬───┬───┬───────────────┬───┬───┬──────────────────┬───┐
//!   │ H │  32 B    │ F │ H │     64 B      │ F │ H │    3976 B free   │ F │
//!   └───┴──────────┴───┴───┴───────────────┴───┴───┴──────────────────┴───┘
//!   0   4          36  40  44              108 112 116                4092
//!
//!   H = header tag, F = footer tag (identical 4 byte words).
//!   Blocks tile the region exactly: Σ (payload + 8) == capacity.
//! ```
//!
//! A tag packs the free flag into bit 31 and the payload size into the low 31
//! bits. Because the footer mirrors the header, a block can find both of its
//! neighbours without any side index:
//!
//! ```text
//!   ◄── previous block ──►◄────────── this block ──────────►◄── next ...
//!   ┌─────────────────┬───┬───┬──────────────────────────┬───┬───┬──────
//!   │      ...        │ F │ H │         payload          │ F │ H │ ...
//!   └─────────────────┴───┴───┴──────────────────────────┴───┴───┴──────
//!                       ▲       ▲                              ▲
//!                       │       └── pointer returned to user   │
//!        previous footer: header - 4          next header: footer + 4
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - align! macro (rounds requests to the tag width)
//!   ├── block      - Block view: offset, size, state
//!   ├── error      - AllocError, FreeError, Corruption, ConfigError
//!   ├── heap       - Heap: allocate, deallocate, blocks, check
//!   ├── region     - HeapSource, MmapSource, bounds-checked Region
//!   └── tag        - Tag encoding
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::Heap;
//!
//! let mut heap = Heap::new();
//!
//! let a = heap.allocate(32).unwrap();
//! let b = heap.allocate(64).unwrap();
//! assert_eq!(b.as_ptr() as usize, a.as_ptr() as usize + 32 + 8);
//!
//! unsafe { a.cast::<u64>().write_unaligned(42) };
//!
//! heap.deallocate(a).unwrap();
//! heap.deallocate(b).unwrap();
//!
//! let stats = heap.check().unwrap();
//! assert_eq!(stats.free_blocks, 1);
//! assert_eq!(stats.largest_free, 4096 - 8);
//! ```
//!
//! ## How It Works
//!
//! - **Acquisition**: the region is mapped lazily on the first `allocate`. If
//!   that fails, every later request fails too; acquisition is never retried.
//! - **Placement**: blocks are scanned from the start of the region and the
//!   first free one that is large enough wins. If it is more than 8 bytes too
//!   large it is split and the tail becomes a new free block; otherwise the
//!   caller gets the whole block.
//! - **Release**: the block is marked free and merged with the following and
//!   preceding blocks when those are free, so no two free blocks ever touch.
//!
//! ## Limitations
//!
//! - **Fixed size**: the region never grows.
//! - **Single-threaded only**: no synchronization primitives.
//! - **Word alignment only**: payloads are aligned to the 4 byte tag width.
//! - **Unix-only**: the default source uses `libc::mmap`.
//!
//! ## Safety
//!
//! The allocator validates every pointer handed to `deallocate`, so misuse is
//! reported as a [`FreeError`] instead of corrupting metadata. Reading and
//! writing through the returned pointers is still `unsafe`: they dangle once
//! the block is freed or the [`Heap`] is dropped.

pub mod align;
mod block;
mod error;
mod heap;
mod region;
mod tag;

pub use block::Block;
pub use error::{AllocError, ConfigError, Corruption, FreeError};
pub use heap::{Blocks, HEAP_CAPACITY, Heap, HeapStats, MIN_CAPACITY, SPLIT_THRESHOLD};
pub use region::{HeapSource, MmapSource};
pub use tag::{BlockState, MAX_BLOCK_SIZE, OVERHEAD, TAG_WIDTH, Tag};
