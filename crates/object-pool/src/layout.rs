//! Per-page byte layout derived from the configuration and object size.
//!
//! A page is laid out as:
//!
//! ```text
//! ┌──────────┬────────────┬────────┬──────┬────────┬──────┬─ ─ ─
//! │ page link│ left align │ header │ pad  │ object │ pad  │ ...
//! │ (ptr)    │ filler     │        │      │        │      │
//! └──────────┴────────────┴────────┴──────┴────────┴──────┴─ ─ ─
//!      ─ ─ ─┬─────────────┬────────┬──────┬────────┬──────┐
//!       ... │ inter align │ header │ pad  │ object │ pad  │  (× objects_per_page − 1)
//!      ─ ─ ─┴─────────────┴────────┴──────┴────────┴──────┘
//! ```
//!
//! The calculator is a pure function and rejects nothing. Pathological
//! combinations are a caller contract violation and are not checked
//! dynamically; in particular, `object_size < size_of::<*mut u8>()` leaves
//! no room for the free-list link overlay.

use crate::config::Config;

/// Size of the page-link slot and of the free-list link overlay.
pub(crate) const PTR_SIZE: usize = size_of::<*mut u8>();

/// The derived byte layout of one page.
///
/// `header_offset`, `left_pad_offset`, and `object_offset` are measured from
/// the start of a repeating block's stride region, i.e. from the start of
/// that block's alignment filler. For absolute positions use
/// [`object_offset_in_page`](Self::object_offset_in_page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Size of the caller-visible object region.
    pub object_size: usize,
    /// Blocks carved from each page.
    pub objects_per_page: usize,
    /// Pad fence width on each side of the object region.
    pub pad_bytes: usize,
    /// Bytes occupied by the configured header variant.
    pub header_size: usize,
    /// Alignment filler between the page link and the first header.
    pub left_align: usize,
    /// Alignment filler between consecutive blocks.
    pub inter_align: usize,
    /// Page base to the first object region; includes the page-link slot.
    pub left_stride: usize,
    /// Byte distance between consecutive object regions.
    pub inter_stride: usize,
    /// Total bytes per page.
    pub page_size: usize,
    /// Stride-region start to the header.
    pub header_offset: usize,
    /// Stride-region start to the left pad.
    pub left_pad_offset: usize,
    /// Stride-region start to the object region.
    pub object_offset: usize,
}

impl BlockLayout {
    /// Derives the page layout for `object_size`-byte blocks under `config`.
    #[must_use]
    pub fn compute(object_size: usize, config: &Config) -> Self {
        let header_size = config.header_kind.size();
        let pad = config.pad_bytes;

        let left_total = header_size + pad + PTR_SIZE;
        let inter_total = header_size + 2 * pad + object_size;
        let (left_align, inter_align) = if config.alignment <= 1 {
            (0, 0)
        } else {
            (left_total % config.alignment, inter_total % config.alignment)
        };

        let left_stride = PTR_SIZE + left_align + header_size + pad;
        let inter_stride = inter_total + inter_align;
        let page_size =
            left_stride + (config.objects_per_page - 1) * inter_stride + object_size + pad;

        Self {
            object_size,
            objects_per_page: config.objects_per_page,
            pad_bytes: pad,
            header_size,
            left_align,
            inter_align,
            left_stride,
            inter_stride,
            page_size,
            header_offset: inter_align,
            left_pad_offset: inter_align + header_size,
            object_offset: inter_align + header_size + pad,
        }
    }

    /// Byte offset from the page base to the object region of block `index`.
    #[must_use]
    pub fn object_offset_in_page(&self, index: usize) -> usize {
        self.left_stride + index * self.inter_stride
    }

    /// Byte offset from the page base to the header of block `index`.
    #[must_use]
    pub fn header_offset_in_page(&self, index: usize) -> usize {
        self.object_offset_in_page(index) - self.pad_bytes - self.header_size
    }
}
