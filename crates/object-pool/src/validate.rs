//! Debug-mode validation of freed blocks and page scans.
//!
//! Checks run in an order that never reads a byte outside pool-owned
//! memory: the containing page is located first, then the address is pinned
//! to a block boundary by pure arithmetic, and only then are the
//! double-free fingerprint and the pad fences inspected.

use snafu::ensure;

use crate::{
    error::{BadAddressSnafu, BadBoundarySnafu, CorruptedBlockSnafu, MultipleFreeSnafu, Result},
    free_list::FreeList,
    layout::{BlockLayout, PTR_SIZE},
    page::PageList,
    pattern,
};

/// Validates an address handed to `free`.
///
/// Verdicts: `BadAddress` when no page contains the address, `BadBoundary`
/// when it is inside a page but not at an object-region start,
/// `MultipleFree` when the block is already free, `CorruptedBlock` when a
/// pad fence was overwritten.
///
/// # Safety
///
/// `pages` and `free_list` must belong to the same pool and be in a
/// consistent state.
pub(crate) unsafe fn check_block_on_free(
    object: *mut u8,
    pages: &PageList,
    free_list: &FreeList,
    layout: &BlockLayout,
) -> Result<()> {
    let address = object.addr();
    let page = pages
        .find_containing(address)
        .ok_or_else(|| BadAddressSnafu { address }.build())?;

    // Boundary. The first object sits `left_stride` past the page base and
    // the rest follow at inter-stride multiples.
    let first_object = page.addr() + layout.left_stride;
    let distance = address
        .checked_sub(first_object)
        .ok_or_else(|| BadBoundarySnafu { address }.build())?;
    ensure!(
        distance.is_multiple_of(layout.inter_stride)
            && distance / layout.inter_stride < layout.objects_per_page,
        BadBoundarySnafu { address }
    );

    // Double free. A freed object keeps the FREED pattern past its link
    // overlay; objects too small to carry that fingerprint are looked up in
    // the free list instead.
    if layout.object_size > PTR_SIZE {
        let fingerprint = unsafe { object.add(PTR_SIZE).read() };
        ensure!(fingerprint != pattern::FREED, MultipleFreeSnafu { address });
    } else {
        ensure!(
            !unsafe { free_list.contains(object) },
            MultipleFreeSnafu { address }
        );
    }

    unsafe {
        check_pads(object, layout)?;
    }
    Ok(())
}

/// Verifies the pad fences on both sides of an object region.
///
/// # Safety
///
/// `object` must be the object-region address of a block inside a live,
/// painted page.
pub(crate) unsafe fn check_pads(object: *mut u8, layout: &BlockLayout) -> Result<()> {
    let address = object.addr();
    for side in [
        unsafe { object.sub(layout.pad_bytes) },
        unsafe { object.add(layout.object_size) },
    ] {
        for i in 0..layout.pad_bytes {
            let byte = unsafe { side.add(i).read() };
            ensure!(byte == pattern::PAD, CorruptedBlockSnafu { address });
        }
    }
    Ok(())
}

/// Runs the corruption check over every block of every page, invoking
/// `callback` with `(object address, object size)` for each damaged block.
/// Returns the damage count.
///
/// # Safety
///
/// `pages` must hold fully initialized (painted) pages laid out per
/// `layout`.
pub(crate) unsafe fn scan_pages<F>(pages: &PageList, layout: &BlockLayout, mut callback: F) -> usize
where
    F: FnMut(*const u8, usize),
{
    let mut damaged = 0;
    for page in pages.iter() {
        for index in 0..layout.objects_per_page {
            let object = unsafe { page.add(layout.object_offset_in_page(index)) };
            if unsafe { check_pads(object, layout) }.is_err() {
                callback(object.cast_const(), layout.object_size);
                damaged += 1;
            }
        }
    }
    damaged
}
