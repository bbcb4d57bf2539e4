//! Error type for pool operations.

use snafu::{Location, Snafu};

/// The errors a pool operation can raise.
///
/// `OutOfLogicalMemory` and `OutOfPhysicalMemory` can occur on any
/// `allocate`; the remaining variants are misuse diagnostics raised by
/// `free` only while debug instrumentation is enabled. None are retried
/// internally, and statistics reflect only operations that completed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum PoolError {
    /// The configured page cap was reached.
    #[snafu(display("out of logical memory: page cap of {max_pages} reached"))]
    OutOfLogicalMemory {
        /// Configured cap that was hit.
        max_pages: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The system allocator refused the request.
    #[snafu(display("out of physical memory: system refused {requested} bytes"))]
    OutOfPhysicalMemory {
        /// Size of the refused request.
        requested: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The block is already on the free list.
    #[snafu(display("multiple free of block at {address:#x}"))]
    MultipleFree {
        /// Object-region address passed to `free`.
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// A pad byte next to the block was overwritten.
    #[snafu(display("corrupted pad bytes around block at {address:#x}"))]
    CorruptedBlock {
        /// Object-region address passed to `free`.
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The address lies inside a page but not on a block boundary.
    #[snafu(display("address {address:#x} is not on a block boundary"))]
    BadBoundary {
        /// Offending address.
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The address lies in no page owned by the pool.
    #[snafu(display("address {address:#x} does not belong to any page"))]
    BadAddress {
        /// Offending address.
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = PoolError> = core::result::Result<T, E>;
