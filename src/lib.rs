//! # rsegalloc - A Segregated Free-List Allocator
//!
//! This crate provides a user-space `malloc`/`free` replacement that builds
//! its heap out of fixed-size chunks obtained from a [`PageSource`] and
//! subdivides them into individually sized blocks.
//!
//! ## Overview
//!
//! Free blocks are kept in a small, fixed number of size-class buckets, each
//! an intrusive singly linked list threaded through the free blocks
//! themselves:
//!
//! ```text
//!   Free-List Index:
//!
//!   ┌───────────┐
//!   │ bucket 0  │──► null
//!   │ bucket 1  │──► null
//!   │    ...    │
//!   │ bucket 3  │──► ┌──────┐    ┌──────┐
//!   │           │    │  8   │──► │  8   │──► null
//!   │           │    └──────┘    └──────┘
//!   │    ...    │
//!   │ bucket 11 │──► ┌──────┐
//!   │           │    │ 4048 │──► null
//!   └───────────┘    └──────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rsegalloc
//!   ├── align        - Granularity and alignment macros (align!, align_to!)
//!   ├── block        - Block header layout (internal)
//!   ├── size_class   - BucketPolicy: breakpoint or power-of-two classes
//!   ├── free_list    - Bucketed intrusive free lists (internal)
//!   ├── page_source  - PageSource trait, mmap and arena sources
//!   ├── config       - HeapConfig
//!   ├── error        - Error types
//!   ├── stats        - HeapStats
//!   └── heap         - Heap: allocate / free
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rsegalloc::{Heap, MmapPageSource, align};
//!
//! let mut heap: Heap<MmapPageSource> = Heap::default();
//!
//! unsafe {
//!     // Sizes are normalized by the caller.
//!     let ptr = heap.allocate(align!(13)).as_ptr().cast::<u64>();
//!
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     heap.free(ptr.cast());
//! }
//! ```
//!
//! ## How It Works
//!
//! Allocation scans buckets upward from the one the request maps to and takes
//! the smallest block that fits within the first bucket holding any fit. When
//! nothing fits, a single chunk is requested, formatted as one free block and
//! the search runs once more:
//!
//! ```text
//!   Fresh chunk:
//!   ┌────────┬──────────────────────────────────────────────────────┐
//!   │ Header │                 free (chunk - header)                │
//!   └────────┴──────────────────────────────────────────────────────┘
//!
//!   After allocate(n) splits it:
//!   ┌────────┬─────────┬────────┬───────────────────────────────────┐
//!   │ Header │ n bytes │ Header │     free (chunk - n - 2 headers)  │
//!   └────────┴─────────┴────────┴───────────────────────────────────┘
//!            ▲
//!            └── Pointer returned to user
//! ```
//!
//! A remainder too small to host a header stays attached to the allocated
//! block. Freeing pushes the block onto the front of its bucket; adjacent free
//! blocks are never merged.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No coalescing**: Freed neighbours stay separate blocks
//! - **No page return**: Chunks are never given back while the heap lives
//! - **Bounded objects**: Requests must fit inside a single chunk
//!
//! ## Safety
//!
//! `allocate` and `free` trust their callers: sizes must already be
//! normalized and pointers must come from the same heap, freed once.

pub mod align;
mod block;
mod config;
mod error;
mod free_list;
mod heap;
mod page_source;
mod size_class;
mod stats;

pub use align::GRANULARITY;
pub use block::HEADER_SIZE;
pub use config::{DEFAULT_CHUNK_SIZE, HeapConfig, MAX_OBJECT_SIZE};
pub use error::{ConfigError, HeapError, HeapResult, PageSourceError};
pub use free_list::FreeBlock;
pub use heap::Heap;
pub use page_source::{ArenaPageSource, MmapPageSource, PageSource};
pub use size_class::{BUCKET_COUNT, BucketPolicy};
pub use stats::HeapStats;
