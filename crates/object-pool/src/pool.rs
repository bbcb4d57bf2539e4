//! The allocator façade: composes the layout, page store, free list,
//! header engine, pattern engine, and validator into the public operations.

use std::alloc::{self, Layout};

use snafu::ensure;

use crate::{
    config::{Config, HeaderKind},
    error::{OutOfPhysicalMemorySnafu, Result},
    free_list::FreeList,
    header,
    layout::BlockLayout,
    page::{self, PageList},
    pattern,
    stats::Stats,
};

/// A fixed-size object pool allocator.
///
/// Memory is obtained from the system in fixed-size pages, each carved into
/// `objects_per_page` equally sized blocks. `allocate` and `free` are O(1)
/// and touch the system allocator only when a new page is needed. Optional
/// debug instrumentation paints signature patterns and validates every
/// `free`.
///
/// The pool is single-threaded: no operation may run concurrently with any
/// other on the same instance. Dropping the pool releases every page and
/// every outstanding external header record.
///
/// # Caller contract
///
/// `object_size` must be at least `size_of::<*mut u8>()`: while a block is
/// free, its first pointer-sized object bytes carry the free-list link.
/// This is not checked dynamically.
///
/// # Examples
///
/// ```
/// use object_pool::{Config, ObjectPool};
///
/// let mut pool = ObjectPool::new(64, Config::default());
/// let object = pool.allocate(None).unwrap();
/// unsafe {
///     pool.free(object).unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct ObjectPool {
    config: Config,
    layout: BlockLayout,
    pages: PageList,
    free_list: FreeList,
    stats: Stats,
}

// The pool owns its pages exclusively; it can move between threads but
// requires external synchronization for shared access.
unsafe impl Send for ObjectPool {}

impl ObjectPool {
    /// Creates a pool serving `object_size`-byte objects under `config`.
    ///
    /// No page is allocated until the first `allocate`.
    #[must_use]
    pub fn new(object_size: usize, config: Config) -> Self {
        let layout = BlockLayout::compute(object_size, &config);
        let pages = PageList::new(layout.page_size, config.alignment, config.max_pages);
        let stats = Stats {
            object_size,
            page_size: layout.page_size,
            ..Stats::default()
        };
        Self {
            config,
            layout,
            pages,
            free_list: FreeList::new(),
            stats,
        }
    }

    /// Serves one block and returns its object-region address.
    ///
    /// The label is copied into the block's side record under
    /// [`HeaderKind::External`] and ignored otherwise.
    ///
    /// # Errors
    ///
    /// [`OutOfLogicalMemory`](crate::PoolError::OutOfLogicalMemory) when a
    /// page would exceed the configured cap,
    /// [`OutOfPhysicalMemory`](crate::PoolError::OutOfPhysicalMemory) when
    /// the system allocator refuses. Statistics are untouched on failure.
    pub fn allocate(&mut self, label: Option<&str>) -> Result<*mut u8> {
        if self.config.use_system_allocator {
            let object = unsafe { alloc::alloc(Self::system_layout(self.layout.object_size)) };
            ensure!(
                !object.is_null(),
                OutOfPhysicalMemorySnafu {
                    requested: self.layout.object_size,
                }
            );
            self.stats.on_allocate();
            return Ok(object);
        }

        if self.free_list.is_empty() {
            self.grow()?;
        }
        let Some(object) = (unsafe { self.free_list.pop() }) else {
            unreachable!("free list is non-empty after page growth");
        };

        unsafe {
            header::write_on_alloc(
                self.header_of(object),
                self.config.header_kind,
                self.alloc_num(),
                label,
            );
        }
        if self.config.debug {
            unsafe {
                pattern::paint_object(object, self.layout.object_size, pattern::ALLOCATED);
            }
        }
        self.stats.free_objects -= 1;
        self.stats.on_allocate();
        Ok(object)
    }

    /// Returns a block to the pool.
    ///
    /// # Errors
    ///
    /// With debug enabled, misuse is rejected with
    /// [`MultipleFree`](crate::PoolError::MultipleFree),
    /// [`CorruptedBlock`](crate::PoolError::CorruptedBlock),
    /// [`BadBoundary`](crate::PoolError::BadBoundary), or
    /// [`BadAddress`](crate::PoolError::BadAddress); the block is not freed
    /// and statistics are untouched.
    ///
    /// # Safety
    ///
    /// `object` must be an address returned by [`allocate`](Self::allocate)
    /// on this pool and not freed since. With debug enabled the validator
    /// catches violations; without it they are undefined behavior.
    pub unsafe fn free(&mut self, object: *mut u8) -> Result<()> {
        if self.config.use_system_allocator {
            unsafe {
                alloc::dealloc(object, Self::system_layout(self.layout.object_size));
            }
            self.stats.on_free();
            return Ok(());
        }

        if self.config.debug {
            unsafe {
                crate::validate::check_block_on_free(
                    object,
                    &self.pages,
                    &self.free_list,
                    &self.layout,
                )?;
            }
        }

        unsafe {
            header::clear_on_free(self.header_of(object), self.config.header_kind);
        }
        if self.config.debug {
            unsafe {
                pattern::paint_object(object, self.layout.object_size, pattern::FREED);
            }
        }
        unsafe {
            self.free_list.push(object);
        }
        self.stats.free_objects += 1;
        self.stats.on_free();
        Ok(())
    }

    /// Walks every block of every page and invokes `callback` with
    /// `(object address, object size)` for each block currently in use.
    /// Returns the number of callbacks made.
    ///
    /// In-use is read from the header's flag where the variant records one,
    /// and falls back to free-list membership otherwise.
    pub fn dump_in_use<F>(&self, mut callback: F) -> usize
    where
        F: FnMut(*const u8, usize),
    {
        let mut count = 0;
        for page in self.pages.iter() {
            for index in 0..self.layout.objects_per_page {
                let object = unsafe { page.add(self.layout.object_offset_in_page(index)) };
                let in_use = match unsafe {
                    header::is_in_use(self.header_of(object), self.config.header_kind)
                } {
                    Some(flag) => flag,
                    None => !unsafe { self.free_list.contains(object) },
                };
                if in_use {
                    callback(object.cast_const(), self.layout.object_size);
                    count += 1;
                }
            }
        }
        count
    }

    /// Checks the pad fences of every block on every page, invoking
    /// `callback` with `(object address, object size)` for each damaged
    /// block. Returns the damage count; 0 when debug is off or no pads are
    /// configured.
    pub fn validate_pages<F>(&self, callback: F) -> usize
    where
        F: FnMut(*const u8, usize),
    {
        if !self.config.debug || self.layout.pad_bytes == 0 {
            return 0;
        }
        unsafe { crate::validate::scan_pages(&self.pages, &self.layout, callback) }
    }

    /// Releases every page all of whose blocks are on the free list and
    /// returns how many were released.
    pub fn reclaim_empty_pages(&mut self) -> usize {
        let mut released = 0;
        let mut current = self.pages.head();
        while !current.is_null() {
            let next = unsafe { page::next_page(current) };
            let free_here = unsafe {
                self.free_list
                    .count_in_span(current, self.layout.page_size)
            };
            if free_here == self.layout.objects_per_page {
                let removed = unsafe {
                    self.free_list
                        .unlink_span(current, self.layout.page_size)
                };
                debug_assert_eq!(removed, self.layout.objects_per_page);
                unsafe {
                    self.pages.remove(current);
                }
                self.stats.pages_in_use -= 1;
                self.stats.free_objects -= removed;
                released += 1;
            }
            current = next;
        }
        if released > 0 {
            log::debug!("reclaimed {released} empty page(s)");
        }
        released
    }

    /// Enables or disables debug instrumentation.
    ///
    /// Pages born while debugging was off carry no signature patterns, so
    /// pattern-based checks only cover activity after the switch.
    pub fn set_debug(&mut self, enabled: bool) {
        self.config.debug = enabled;
    }

    /// Object-region address of the next block `allocate` would serve, or
    /// null.
    #[must_use]
    pub fn free_list(&self) -> *const u8 {
        self.free_list.head().cast_const()
    }

    /// Base address of the most recently added page, or null.
    #[must_use]
    pub fn page_list(&self) -> *const u8 {
        self.pages.head().cast_const()
    }

    /// The live configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The derived per-page layout.
    #[must_use]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// The live statistics.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Whether the O(1) empty-page reclamation optimization is present.
    #[must_use]
    pub fn implements_extra_credit(&self) -> bool {
        false
    }

    /// Allocates a page, initializes its headers (and patterns when
    /// debugging), and threads its blocks onto the free list, first block
    /// first, so the highest-address block is served next.
    fn grow(&mut self) -> Result<()> {
        let new_page = self.pages.push()?;
        if self.config.debug {
            unsafe {
                pattern::paint_new_page(new_page, &self.layout);
            }
        } else {
            // Headers must be valid in release mode too: the in-use flag
            // and the external record slot are read by dump_in_use and
            // Drop.
            for index in 0..self.layout.objects_per_page {
                unsafe {
                    new_page
                        .add(self.layout.header_offset_in_page(index))
                        .write_bytes(0, self.layout.header_size);
                }
            }
        }
        for index in 0..self.layout.objects_per_page {
            unsafe {
                self.free_list
                    .push(new_page.add(self.layout.object_offset_in_page(index)));
            }
        }
        self.stats.pages_in_use += 1;
        self.stats.free_objects += self.layout.objects_per_page;
        Ok(())
    }

    /// Header address of the block whose object region starts at `object`.
    ///
    /// # Safety
    ///
    /// `object` must be the object-region address of a block inside a live
    /// page.
    unsafe fn header_of(&self, object: *mut u8) -> *mut u8 {
        unsafe { object.sub(self.layout.pad_bytes + self.layout.header_size) }
    }

    /// Allocation number stamped into headers: the count of allocations
    /// served before the one in progress.
    #[expect(clippy::cast_possible_truncation)]
    fn alloc_num(&self) -> u32 {
        self.stats.allocations_total as u32
    }

    fn system_layout(object_size: usize) -> Layout {
        Layout::from_size_align(object_size.max(1), align_of::<usize>()).unwrap()
    }
}

impl Drop for ObjectPool {
    fn drop(&mut self) {
        // Side records of blocks still live at destruction would otherwise
        // leak; the page buffers themselves are released by the page store.
        if matches!(self.config.header_kind, HeaderKind::External) {
            for page in self.pages.iter() {
                for index in 0..self.layout.objects_per_page {
                    let object = unsafe { page.add(self.layout.object_offset_in_page(index)) };
                    unsafe {
                        header::clear_on_free(self.header_of(object), HeaderKind::External);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::PoolError,
        layout::PTR_SIZE,
        pattern::{ALLOCATED, FREED, PAD},
    };

    // Scenario: no header, no debug, no pads. Blocks tile back to back and
    // are served LIFO from the highest address down.
    #[test]
    fn addresses_descend_within_a_page() {
        let config = Config {
            objects_per_page: 4,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);

        let addrs: Vec<_> = (0..4).map(|_| pool.allocate(None).unwrap()).collect();
        for pair in addrs.windows(2) {
            assert_eq!(pair[0].addr() - pair[1].addr(), 8);
        }
        assert_eq!(pool.stats().pages_in_use, 1);

        // A fifth allocation forces a second page.
        pool.allocate(None).unwrap();
        assert_eq!(pool.stats().pages_in_use, 2);
    }

    // Scenario: a stray write into a pad fence is found by the page scan
    // and attributed to the right block.
    #[test]
    fn validate_pages_reports_pad_damage() {
        let config = Config {
            objects_per_page: 3,
            pad_bytes: 2,
            header_kind: HeaderKind::Basic,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let _first = pool.allocate(None).unwrap();
        let middle = pool.allocate(None).unwrap();
        let _last = pool.allocate(None).unwrap();

        unsafe {
            middle.add(16).write(0x00);
        }

        let mut reported = Vec::new();
        let count = pool.validate_pages(|addr, size| reported.push((addr.addr(), size)));
        assert_eq!(count, 1);
        assert_eq!(reported, vec![(middle.addr(), 16)]);
    }

    // Scenario: external header with a label; the side record lives while
    // the block does.
    #[test]
    fn external_header_carries_label() {
        let config = Config {
            objects_per_page: 2,
            header_kind: HeaderKind::External,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(32, config);
        let object = pool.allocate(Some("scene-tree")).unwrap();

        let mut dumped = Vec::new();
        let count = pool.dump_in_use(|addr, size| dumped.push((addr.addr(), size)));
        assert_eq!(count, 1);
        assert_eq!(dumped, vec![(object.addr(), 32)]);

        unsafe {
            let info = header::external_info(pool.header_of(object)).unwrap();
            assert!(info.in_use);
            assert_eq!(info.alloc_num, 0, "first allocation stamps number 0");
            assert_eq!(info.label.as_deref(), Some("scene-tree"));
        }

        unsafe {
            pool.free(object).unwrap();
            assert!(header::external_info(pool.header_of(object)).is_none());
        }
        assert_eq!(pool.dump_in_use(|_, _| {}), 0);
    }

    // Scenario: double free.
    #[test]
    fn double_free_is_detected() {
        let config = Config {
            objects_per_page: 4,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(24, config);
        let object = pool.allocate(None).unwrap();
        unsafe {
            pool.free(object).unwrap();
            let err = pool.free(object).unwrap_err();
            assert!(matches!(err, PoolError::MultipleFree { .. }));
        }
        assert_eq!(pool.stats().deallocations_total, 1);
        assert_eq!(pool.stats().free_objects, 4);
    }

    // Objects exactly one link wide carry no FREED fingerprint; the
    // free-list walk catches the double free instead.
    #[test]
    fn double_free_of_link_sized_objects_walks_the_list() {
        let config = Config {
            objects_per_page: 2,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(PTR_SIZE, config);
        let object = pool.allocate(None).unwrap();
        unsafe {
            pool.free(object).unwrap();
            let err = pool.free(object).unwrap_err();
            assert!(matches!(err, PoolError::MultipleFree { .. }));
        }
    }

    // Scenario: boundary and foreign-address rejection.
    #[test]
    fn misaligned_and_foreign_addresses_are_rejected() {
        let config = Config {
            objects_per_page: 4,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let object = pool.allocate(None).unwrap();

        let err = unsafe { pool.free(object.add(3)) }.unwrap_err();
        assert!(matches!(err, PoolError::BadBoundary { .. }));

        let mut stack_var = 0_u64;
        let err = unsafe { pool.free((&raw mut stack_var).cast::<u8>()) }.unwrap_err();
        assert!(matches!(err, PoolError::BadAddress { .. }));

        // The block itself is still perfectly freeable.
        unsafe {
            pool.free(object).unwrap();
        }
        assert_eq!(pool.stats().deallocations_total, 1);
    }

    // Scenario: a fully freed page is reclaimed and the pool re-grows on
    // demand.
    #[test]
    fn empty_pages_are_reclaimed() {
        let config = Config {
            objects_per_page: 4,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let addrs: Vec<_> = (0..4).map(|_| pool.allocate(None).unwrap()).collect();
        for addr in addrs {
            unsafe {
                pool.free(addr).unwrap();
            }
        }

        assert_eq!(pool.reclaim_empty_pages(), 1);
        assert_eq!(pool.stats().pages_in_use, 0);
        assert!(pool.page_list().is_null());
        assert!(pool.free_list().is_null());

        pool.allocate(None).unwrap();
        assert_eq!(pool.stats().pages_in_use, 1);
    }

    #[test]
    fn reclaim_skips_pages_with_live_blocks() {
        let config = Config {
            objects_per_page: 2,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);
        let a = pool.allocate(None).unwrap();
        let b = pool.allocate(None).unwrap();
        let c = pool.allocate(None).unwrap(); // second page
        unsafe {
            pool.free(a).unwrap();
            pool.free(b).unwrap();
        }

        assert_eq!(pool.stats().pages_in_use, 2);
        assert_eq!(pool.reclaim_empty_pages(), 1);
        assert_eq!(pool.stats().pages_in_use, 1);
        let stats = pool.stats();
        assert_eq!(stats.live_objects, 1);
        assert_eq!(stats.free_objects, 1);
        assert_eq!(stats.pages_in_use * 2, stats.live_objects + stats.free_objects);

        unsafe {
            pool.free(c).unwrap();
        }
    }

    #[test]
    fn allocate_free_round_trip_restores_state() {
        let config = Config {
            objects_per_page: 3,
            pad_bytes: 4,
            header_kind: HeaderKind::Basic,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        pool.allocate(None).unwrap(); // settle the first page

        let baseline_head = pool.free_list();
        let baseline = pool.stats().clone();

        let object = pool.allocate(None).unwrap();
        unsafe {
            pool.free(object).unwrap();
        }

        assert_eq!(pool.free_list(), baseline_head);
        assert_eq!(pool.stats().live_objects, baseline.live_objects);
        assert_eq!(pool.stats().free_objects, baseline.free_objects);
        assert_eq!(pool.stats().allocations_total, baseline.allocations_total + 1);
        assert_eq!(
            pool.stats().deallocations_total,
            baseline.deallocations_total + 1
        );
    }

    #[test]
    fn debug_patterns_track_block_state() {
        let config = Config {
            objects_per_page: 2,
            pad_bytes: 3,
            header_kind: HeaderKind::Basic,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let object = pool.allocate(None).unwrap();

        unsafe {
            for i in 0..16 {
                assert_eq!(object.add(i).read(), ALLOCATED);
            }
            for i in 1..=3 {
                assert_eq!(object.sub(i).read(), PAD);
                assert_eq!(object.add(15 + i).read(), PAD);
            }

            pool.free(object).unwrap();
            for i in PTR_SIZE..16 {
                assert_eq!(object.add(i).read(), FREED);
            }
        }
        assert_eq!(pool.free_list().addr(), object.addr());
    }

    #[test]
    fn conservation_invariants_hold_across_churn() {
        let config = Config {
            objects_per_page: 3,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);
        let mut live = Vec::new();
        for round in 0..5 {
            for _ in 0..=round {
                live.push(pool.allocate(None).unwrap());
            }
            if round % 2 == 0 {
                let object = live.swap_remove(0);
                unsafe {
                    pool.free(object).unwrap();
                }
            }
            let stats = pool.stats();
            assert_eq!(
                stats.pages_in_use * 3,
                stats.live_objects + stats.free_objects
            );
            assert_eq!(
                stats.allocations_total - stats.deallocations_total,
                stats.live_objects
            );
            assert!(stats.peak_live_objects >= stats.live_objects);
        }
    }

    #[test]
    fn page_cap_surfaces_as_out_of_logical_memory() {
        let config = Config {
            objects_per_page: 2,
            max_pages: 1,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);
        pool.allocate(None).unwrap();
        pool.allocate(None).unwrap();

        let err = pool.allocate(None).unwrap_err();
        assert!(matches!(err, PoolError::OutOfLogicalMemory { .. }));
        // The failed allocation left the statistics alone.
        assert_eq!(pool.stats().allocations_total, 2);
        assert_eq!(pool.stats().live_objects, 2);
    }

    #[test]
    fn system_allocator_mode_bypasses_pages() {
        let config = Config {
            use_system_allocator: true,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(64, config);
        let a = pool.allocate(Some("ignored")).unwrap();
        let b = pool.allocate(None).unwrap();

        assert_eq!(pool.stats().pages_in_use, 0);
        assert_eq!(pool.stats().free_objects, 0);
        assert_eq!(pool.stats().live_objects, 2);
        assert_eq!(pool.stats().peak_live_objects, 2);
        assert!(pool.page_list().is_null());
        assert!(pool.free_list().is_null());

        unsafe {
            pool.free(a).unwrap();
            pool.free(b).unwrap();
        }
        assert_eq!(pool.stats().live_objects, 0);
        assert_eq!(pool.stats().deallocations_total, 2);
    }

    #[test]
    fn extended_counter_counts_block_reuses() {
        let config = Config {
            objects_per_page: 2,
            header_kind: HeaderKind::Extended { extra_bytes: 4 },
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let first = pool.allocate(None).unwrap();
        unsafe {
            pool.free(first).unwrap();
        }
        let second = pool.allocate(None).unwrap();
        assert_eq!(second, first, "LIFO hands the same block back");

        let counter = unsafe {
            let counter_ptr = pool.header_of(second).add(4);
            u16::from_le_bytes([counter_ptr.read(), counter_ptr.add(1).read()])
        };
        assert_eq!(counter, 2);
    }

    #[test]
    fn dump_reports_only_live_blocks() {
        let config = Config {
            objects_per_page: 3,
            header_kind: HeaderKind::Basic,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(16, config);
        let a = pool.allocate(None).unwrap();
        let b = pool.allocate(None).unwrap();
        unsafe {
            pool.free(a).unwrap();
        }

        let mut seen = Vec::new();
        assert_eq!(pool.dump_in_use(|addr, _| seen.push(addr.addr())), 1);
        assert_eq!(seen, vec![b.addr()]);
    }

    #[test]
    fn dump_uses_free_list_when_headers_record_nothing() {
        let config = Config {
            objects_per_page: 4,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);
        let a = pool.allocate(None).unwrap();
        let _b = pool.allocate(None).unwrap();
        unsafe {
            pool.free(a).unwrap();
        }
        assert_eq!(pool.dump_in_use(|_, _| {}), 1);
    }

    #[test]
    fn accessors_and_debug_toggle() {
        let config = Config {
            objects_per_page: 2,
            pad_bytes: 1,
            debug: true,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(8, config);
        assert!(pool.config().debug);

        pool.set_debug(false);
        assert!(!pool.config().debug);
        assert_eq!(pool.validate_pages(|_, _| {}), 0);

        assert!(!pool.implements_extra_credit());
        assert_eq!(pool.stats().object_size, 8);
        assert_eq!(pool.stats().page_size, pool.layout().page_size);
    }

    #[test]
    fn drop_releases_external_records_of_live_blocks() {
        let config = Config {
            objects_per_page: 2,
            header_kind: HeaderKind::External,
            ..Config::default()
        };
        let mut pool = ObjectPool::new(32, config);
        pool.allocate(Some("still live at drop")).unwrap();
        drop(pool);
    }
}
