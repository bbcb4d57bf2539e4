//! Per-block header maintenance.
//!
//! The header region sits immediately before a block's left pad. Its
//! contents depend on the configured [`HeaderKind`]:
//!
//! ```text
//! Basic:     [ alloc_num: u32 (LE) ][ in_use: u8 ]
//! Extended:  [ user: extra_bytes ][ counter: u16 (LE) ][ basic ]
//! External:  [ record address: *mut BlockInfo ]
//! ```
//!
//! Integer fields are stored little-endian through unaligned writes; the
//! header region carries no alignment guarantee of its own.

use crate::config::HeaderKind;

/// Side record maintained for each live block under
/// [`HeaderKind::External`].
#[derive(Debug)]
pub struct BlockInfo {
    /// Whether the owning block is currently allocated.
    pub in_use: bool,
    /// Copy of the label passed to `allocate`, if any.
    pub label: Option<String>,
    /// Allocation number the block was served under.
    pub alloc_num: u32,
}

/// Offset of the basic sub-header inside the full header region.
const fn basic_offset(kind: HeaderKind) -> usize {
    match kind {
        HeaderKind::Extended { extra_bytes } => extra_bytes + 2,
        _ => 0,
    }
}

/// Stamps the header of a block being served.
///
/// For `Extended` headers the user region is reset to zero and the use
/// counter incremented in place; the counter wraps at 65535 and survives
/// free/allocate cycles of the same block.
///
/// # Safety
///
/// `header` must point to `kind.size()` writable bytes that were zeroed at
/// page birth or cleared by [`clear_on_free`].
pub(crate) unsafe fn write_on_alloc(
    header: *mut u8,
    kind: HeaderKind,
    alloc_num: u32,
    label: Option<&str>,
) {
    match kind {
        HeaderKind::None => {}
        HeaderKind::Basic => unsafe {
            write_basic(header, alloc_num);
        },
        HeaderKind::Extended { extra_bytes } => unsafe {
            header.write_bytes(0, extra_bytes);
            let counter = header.add(extra_bytes);
            let next = read_u16(counter).wrapping_add(1);
            write_u16(counter, next);
            write_basic(header.add(basic_offset(kind)), alloc_num);
        },
        HeaderKind::External => {
            let record = Box::new(BlockInfo {
                in_use: true,
                label: label.map(str::to_owned),
                alloc_num,
            });
            unsafe {
                header
                    .cast::<*mut BlockInfo>()
                    .write_unaligned(Box::into_raw(record));
            }
        }
    }
}

/// Clears the header of a block being freed.
///
/// The `Extended` use counter is left untouched. For `External` headers the
/// side record is destroyed (label copy included) and the slot zeroed; the
/// call is idempotent on an already-clear slot.
///
/// # Safety
///
/// `header` must point to `kind.size()` writable bytes last written by
/// [`write_on_alloc`] or zeroed at page birth.
pub(crate) unsafe fn clear_on_free(header: *mut u8, kind: HeaderKind) {
    match kind {
        HeaderKind::None => {}
        HeaderKind::Basic => unsafe {
            header.write_bytes(0, HeaderKind::BASIC_SIZE);
        },
        HeaderKind::Extended { extra_bytes } => unsafe {
            header.write_bytes(0, extra_bytes);
            header
                .add(basic_offset(kind))
                .write_bytes(0, HeaderKind::BASIC_SIZE);
        },
        HeaderKind::External => {
            let slot = header.cast::<*mut BlockInfo>();
            let record = unsafe { slot.read_unaligned() };
            if !record.is_null() {
                drop(unsafe { Box::from_raw(record) });
                unsafe {
                    slot.write_unaligned(core::ptr::null_mut());
                }
            }
        }
    }
}

/// Whether the header records its block as in use. `None` when the variant
/// records nothing (the free list is then the only indicator).
///
/// # Safety
///
/// `header` must point to `kind.size()` initialized bytes maintained by
/// this module.
pub(crate) unsafe fn is_in_use(header: *mut u8, kind: HeaderKind) -> Option<bool> {
    match kind {
        HeaderKind::None => None,
        HeaderKind::Basic | HeaderKind::Extended { .. } => {
            let flag = unsafe { header.add(basic_offset(kind) + 4).read() };
            Some(flag != 0)
        }
        HeaderKind::External => {
            let record = unsafe { header.cast::<*mut BlockInfo>().read_unaligned() };
            if record.is_null() {
                Some(false)
            } else {
                Some(unsafe { (*record).in_use })
            }
        }
    }
}

/// Borrows the side record of a live `External` block, if present.
///
/// # Safety
///
/// `header` must point to an `External` header slot maintained by this
/// module, and the returned borrow must not outlive the block's live state.
#[cfg(test)]
pub(crate) unsafe fn external_info<'a>(header: *mut u8) -> Option<&'a BlockInfo> {
    let record = unsafe { header.cast::<*mut BlockInfo>().read_unaligned() };
    if record.is_null() {
        None
    } else {
        Some(unsafe { &*record })
    }
}

unsafe fn write_basic(basic: *mut u8, alloc_num: u32) {
    unsafe {
        basic.copy_from_nonoverlapping(alloc_num.to_le_bytes().as_ptr(), 4);
        basic.add(4).write(1);
    }
}

unsafe fn read_u16(ptr: *mut u8) -> u16 {
    unsafe { u16::from_le_bytes([ptr.read(), ptr.add(1).read()]) }
}

unsafe fn write_u16(ptr: *mut u8, value: u16) {
    unsafe {
        ptr.copy_from_nonoverlapping(value.to_le_bytes().as_ptr(), 2);
    }
}
