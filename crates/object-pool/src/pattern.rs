//! Signature patterns written in debug mode.
//!
//! Each byte of a page belongs to exactly one region class, and each class
//! gets a recognizable sentinel so damage shows up in a hex dump.

use crate::layout::{BlockLayout, PTR_SIZE};

/// Object bytes never handed out since page birth.
pub const UNALLOCATED: u8 = 0xAA;
/// Object bytes of a live allocation.
pub const ALLOCATED: u8 = 0xBB;
/// Object bytes of a freed block (past the free-list link overlay).
pub const FREED: u8 = 0xCC;
/// Pad fence bytes.
pub const PAD: u8 = 0xDD;
/// Alignment filler bytes.
pub const ALIGN: u8 = 0xEE;

/// Paints a freshly allocated page: everything `UNALLOCATED`, then
/// alignment filler `ALIGN`, headers zero, pads `PAD`. Object regions are
/// left `UNALLOCATED`. The page-link slot is not touched.
///
/// # Safety
///
/// `page` must be the base of a live `layout.page_size`-byte page buffer.
pub(crate) unsafe fn paint_new_page(page: *mut u8, layout: &BlockLayout) {
    unsafe {
        page.add(PTR_SIZE)
            .write_bytes(UNALLOCATED, layout.page_size - PTR_SIZE);
        page.add(PTR_SIZE).write_bytes(ALIGN, layout.left_align);

        for index in 0..layout.objects_per_page {
            let object = page.add(layout.object_offset_in_page(index));
            let header = object.sub(layout.pad_bytes + layout.header_size);
            header.write_bytes(0, layout.header_size);
            object.sub(layout.pad_bytes).write_bytes(PAD, layout.pad_bytes);
            object.add(layout.object_size).write_bytes(PAD, layout.pad_bytes);
            if index + 1 < layout.objects_per_page {
                object
                    .add(layout.object_size + layout.pad_bytes)
                    .write_bytes(ALIGN, layout.inter_align);
            }
        }
    }
}

/// Paints an object region with `pattern`.
///
/// # Safety
///
/// `object` must point to `size` writable bytes inside a live page.
pub(crate) unsafe fn paint_object(object: *mut u8, size: usize, pattern: u8) {
    unsafe {
        object.write_bytes(pattern, size);
    }
}
