//! Pool configuration fixed at construction time.

/// The per-block header variant maintained by the pool.
///
/// The four kinds form a closed set; the pool dispatches on the kind at the
/// header write/clear boundary. [`Extended`](HeaderKind::Extended) composes
/// the basic header with a caller-defined prefix rather than replacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// No header bytes are reserved.
    None,
    /// A 32-bit allocation number followed by a one-byte in-use flag.
    Basic,
    /// `extra_bytes` caller slots, a 16-bit use counter, then the basic
    /// header. The counter survives free/allocate cycles of the same block
    /// and wraps at 65535.
    Extended {
        /// Width of the caller-defined slot region preceding the counter.
        extra_bytes: usize,
    },
    /// A pointer-sized slot that, while the block is in use, holds the
    /// address of a side-allocated [`BlockInfo`](crate::BlockInfo) record;
    /// zero while the block is free.
    External,
}

impl HeaderKind {
    /// Bytes occupied by the basic header: a `u32` allocation number plus
    /// the in-use flag byte.
    pub const BASIC_SIZE: usize = 5;

    /// Bytes this header variant occupies in front of each block.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Basic => Self::BASIC_SIZE,
            Self::Extended { extra_bytes } => extra_bytes + 2 + Self::BASIC_SIZE,
            Self::External => size_of::<*mut u8>(),
        }
    }
}

/// Configuration for an [`ObjectPool`](crate::ObjectPool), fixed at
/// construction.
///
/// The derived byte layout is computed from this configuration and the
/// object size by [`BlockLayout::compute`](crate::layout::BlockLayout::compute).
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of blocks carved from each page. Must be at least 1.
    pub objects_per_page: usize,
    /// Cap on live pages; 0 means unlimited.
    pub max_pages: usize,
    /// Width of the pad fence on each side of the object region.
    pub pad_bytes: usize,
    /// Block alignment; must be a power of two. 0 or 1 disables alignment
    /// filler.
    pub alignment: usize,
    /// Per-block header variant.
    pub header_kind: HeaderKind,
    /// When set, every allocation takes fresh bytes from the system
    /// allocator and pages/free-list bookkeeping is bypassed.
    pub use_system_allocator: bool,
    /// When set, signature patterns are written and `free` validates its
    /// argument.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            objects_per_page: 4,
            max_pages: 0,
            pad_bytes: 0,
            alignment: 0,
            header_kind: HeaderKind::None,
            use_system_allocator: false,
            debug: false,
        }
    }
}
