//! Fixed-size object pool allocator.
//!
//! This crate provides a pool allocator that serves repeated allocation and
//! deallocation of objects of a single, caller-chosen size. Memory is
//! obtained from the system in large fixed-size *pages*; each page is carved
//! into a constant number of equally sized *blocks*. Serving and returning
//! a block is O(1) and does not touch the system allocator.
//!
//! # Memory Layout
//!
//! Free blocks double as free-list nodes: while a block is free, the first
//! pointer-sized bytes of its object region hold the link to the next free
//! block. Pages are threaded into a chain the same way through a
//! pointer-sized slot at the page base.
//!
//! ```text
//! Page Layout:
//! ┌──────────┬───────┬────────┬─────┬────────┬─────┬───────┬────────┬─ ─ ─
//! │ page link│ align │ header │ pad │ object │ pad │ align │ header │ ...
//! └──────────┴───────┴────────┴─────┴────────┴─────┴───────┴────────┴─ ─ ─
//! ```
//!
//! Headers, pad fences, and alignment filler are all optional and
//! configured at construction; see [`Config`] and [`HeaderKind`].
//!
//! # Debug Instrumentation
//!
//! With [`Config::debug`] set, every byte class is painted with a
//! recognizable signature (see [`pattern`]), and `free` validates its
//! argument: double frees, pad-fence corruption, addresses off a block
//! boundary, and addresses the pool has never seen are rejected with the
//! corresponding [`PoolError`]. [`ObjectPool::validate_pages`] scans every
//! block for pad damage on demand. All instrumentation cost disappears when
//! `debug` is off.
//!
//! # Usage Example
//!
//! ```rust
//! use object_pool::{Config, HeaderKind, ObjectPool};
//!
//! let config = Config {
//!     objects_per_page: 8,
//!     pad_bytes: 2,
//!     header_kind: HeaderKind::Basic,
//!     debug: true,
//!     ..Config::default()
//! };
//! let mut pool = ObjectPool::new(64, config);
//!
//! let object = pool.allocate(None).unwrap();
//! assert_eq!(pool.stats().live_objects, 1);
//!
//! unsafe {
//!     pool.free(object).unwrap();
//! }
//! assert_eq!(pool.stats().live_objects, 0);
//! ```
//!
//! # Performance Characteristics
//!
//! | Operation | Cost |
//! |-----------|------|
//! | `allocate` / `free` | O(1), plus one page allocation when the pool grows |
//! | `free` with debug | O(pads) per call, O(n) for link-sized objects |
//! | `dump_in_use` / `validate_pages` | O(pages · blocks) |
//! | `reclaim_empty_pages` | O(pages · free-list length) |
//!
//! # Thread Safety
//!
//! A pool is `Send` but not `Sync`: it can move between threads but
//! requires external synchronization for concurrent access. Independent
//! pools are fully independent.

pub mod config;
pub mod error;
mod free_list;
mod header;
pub mod layout;
mod page;
pub mod pattern;
pub mod pool;
pub mod stats;
mod validate;

pub use self::{
    config::{Config, HeaderKind},
    error::PoolError,
    header::BlockInfo,
    layout::BlockLayout,
    pool::ObjectPool,
    stats::Stats,
};
