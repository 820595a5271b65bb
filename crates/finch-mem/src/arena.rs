//! Arena allocator for `Finch` runtime metadata.
//!
//! Classes in the runtime live for the whole process: once a name is
//! registered, its descriptor must stay at a fixed address so that every
//! object can keep a plain reference to it. The arena gives us exactly that:
//!
//! - **Stable addresses** (chunks never move or shrink)
//! - **Thread-safe bump allocation** through a CAS loop on the chunk pointer
//! - **No per-value free** (memory is returned to the OS only at exit)
//!
//! # Examples
//!
//! ```
//! use finch_mem::arena::GlobalArena;
//!
//! let arena = GlobalArena::new(16 * 1024);
//!
//! let first = arena.alloc(7u32);
//! let second = arena.alloc(11u64);
//!
//! assert_eq!(*first, 7);
//! assert_eq!(*second, 11);
//! ```
//!
//! Values placed in the arena are never dropped. Types with destructors are
//! allowed, but their `Drop` impls will not run.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Error type for arena allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaAllocError;

impl std::fmt::Display for ArenaAllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Arena allocation failed: out of memory")
    }
}

impl std::error::Error for ArenaAllocError {}

/// Minimum alignment handed out by the arena.
const DEFAULT_ALIGNMENT: usize = 8;

/// Smallest chunk the arena will request from the system allocator.
const MIN_CHUNK_SIZE: usize = 8 * 1024;

/// Largest chunk size reached by doubling (oversized requests still get
/// a chunk big enough to hold them).
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Chunk size of the process-wide arena returned by [`global_arena`].
pub const GLOBAL_CHUNK_SIZE: usize = 64 * 1024;

/// Arena allocation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes handed out to callers across all chunks.
    pub total_allocated: usize,
    /// Number of chunks owned by the arena.
    pub chunk_count: usize,
    /// Sum of chunk capacities in bytes.
    pub total_capacity: usize,
}

/// A fixed-size region with an atomic bump pointer.
///
/// Chunks are leaked on creation and owned by the arena through raw
/// pointers, so their memory stays valid for the rest of the process.
struct Chunk {
    start: NonNull<u8>,
    ptr: AtomicPtr<u8>,
    end: NonNull<u8>,
    capacity: usize,
}

impl Chunk {
    fn new(size: usize) -> Result<NonNull<Self>, ArenaAllocError> {
        let layout = Layout::from_size_align(size, DEFAULT_ALIGNMENT)
            .map_err(|_| ArenaAllocError)?;

        // SAFETY: layout has non-zero size (callers never ask for less than
        // MIN_CHUNK_SIZE).
        let start = NonNull::new(unsafe { alloc::alloc(layout) })
            .ok_or(ArenaAllocError)?;

        // SAFETY: one-past-the-end of the block we just allocated.
        let end = unsafe { NonNull::new_unchecked(start.as_ptr().add(size)) };

        let chunk = Box::leak(Box::new(Chunk {
            start,
            ptr: AtomicPtr::new(start.as_ptr()),
            end,
            capacity: size,
        }));

        Ok(NonNull::from(chunk))
    }

    /// Bumps the pointer by `size` bytes aligned to `align`.
    ///
    /// Returns `None` when the chunk cannot fit the request.
    #[inline]
    fn try_alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        loop {
            let current = self.ptr.load(Ordering::Acquire);
            let aligned = current.addr().checked_next_multiple_of(align)?;
            let next = aligned.checked_add(size)?;

            if next > self.end.as_ptr().addr() {
                return None;
            }

            if self
                .ptr
                .compare_exchange_weak(
                    current,
                    current.with_addr(next),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return NonNull::new(current.with_addr(aligned));
            }
        }
    }

    /// True if `addr` falls in the part of this chunk handed out so far.
    #[inline]
    fn contains(&self, addr: usize) -> bool {
        self.start.as_ptr().addr() <= addr && addr < self.ptr.load(Ordering::Acquire).addr()
    }
}

/// Thread-safe arena for allocations that live until process exit.
///
/// `GlobalArena` backs the class registry: every class descriptor is written
/// here once and referenced by `&'static` afterwards. There is deliberately
/// no `reset()`; handing out `'static` references would be unsound otherwise.
///
/// # Examples
///
/// ```
/// use finch_mem::arena::GlobalArena;
///
/// let arena = GlobalArena::new(65536);
/// arena.alloc(1u8);
///
/// let stats = arena.stats();
/// assert!(stats.total_allocated >= 1);
/// assert_eq!(stats.chunk_count, 1);
/// ```
pub struct GlobalArena {
    /// Every chunk ever created, kept for statistics.
    chunks: Mutex<Vec<NonNull<Chunk>>>,
    /// Chunk currently serving allocations.
    current: AtomicPtr<Chunk>,
    /// Size of the next chunk to request.
    chunk_size: usize,
    total_allocated: AtomicUsize,
}

// SAFETY: chunks are never freed and all shared state is atomic or behind a
// Mutex.
unsafe impl Send for GlobalArena {}
unsafe impl Sync for GlobalArena {}

impl GlobalArena {
    /// Creates an arena whose chunks are `chunk_size` bytes, rounded up to
    /// a power of two and to at least 8 KiB.
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        let size = chunk_size.max(MIN_CHUNK_SIZE).next_power_of_two();
        let first = Chunk::new(size)
            .unwrap_or_else(|err| panic!("GlobalArena::new: {err}"));

        GlobalArena {
            chunks: Mutex::new(vec![first]),
            current: AtomicPtr::new(first.as_ptr()),
            chunk_size: size,
            total_allocated: AtomicUsize::new(0),
        }
    }

    /// Moves `value` into the arena and returns a reference to it.
    ///
    /// The reference lives as long as the arena; for [`global_arena`] that
    /// is `'static`.
    ///
    /// # Panics
    ///
    /// Panics if a new chunk is needed and the system allocator fails.
    #[inline]
    #[allow(clippy::mut_from_ref)] // each call returns a fresh, disjoint slot
    pub fn alloc<T>(&self, value: T) -> &mut T {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>().max(DEFAULT_ALIGNMENT);

        loop {
            let current = self.current.load(Ordering::Acquire);

            // SAFETY: `current` always points at a leaked, live chunk.
            let chunk = unsafe { &*current };

            if let Some(slot) = chunk.try_alloc(size, align) {
                let slot = slot.as_ptr().cast::<T>();
                self.total_allocated.fetch_add(size, Ordering::Relaxed);

                // SAFETY: slot is aligned for T, lies inside the chunk and
                // was claimed exclusively by the CAS above.
                unsafe {
                    slot.write(value);
                    return &mut *slot;
                }
            }

            self.grow(size + align, current);
        }
    }

    /// Installs a fresh chunk unless another thread already replaced `seen`.
    #[cold]
    fn grow(&self, min_size: usize, seen: *mut Chunk) {
        let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);

        if self.current.load(Ordering::Acquire) != seen {
            return;
        }

        let size = (self.chunk_size * 2)
            .min(MAX_CHUNK_SIZE)
            .max(min_size.next_power_of_two());
        let chunk = Chunk::new(size)
            .unwrap_or_else(|err| panic!("GlobalArena::grow: {err}"));

        chunks.push(chunk);
        self.current.store(chunk.as_ptr(), Ordering::Release);
    }

    /// True if `value` points into memory this arena has handed out.
    ///
    /// ```
    /// use finch_mem::arena::GlobalArena;
    ///
    /// let arena = GlobalArena::new(8192);
    /// let inside = &*arena.alloc(3u16);
    /// let outside = 3u16;
    ///
    /// assert!(arena.contains(inside));
    /// assert!(!arena.contains(&outside));
    /// ```
    #[must_use]
    pub fn contains<T: ?Sized>(&self, value: &T) -> bool {
        let addr = std::ptr::from_ref(value).cast::<u8>().addr();
        let chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);

        // SAFETY: every pointer in `chunks` refers to a leaked chunk.
        chunks.iter().any(|c| unsafe { c.as_ref().contains(addr) })
    }

    /// Returns allocation statistics for this arena.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);

        ArenaStats {
            total_allocated: self.total_allocated.load(Ordering::Relaxed),
            chunk_count: chunks.len(),
            // SAFETY: every pointer in `chunks` refers to a leaked chunk.
            total_capacity: chunks.iter().map(|c| unsafe { c.as_ref().capacity }).sum(),
        }
    }
}

impl std::fmt::Debug for GlobalArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArena")
            .field("chunk_size", &self.chunk_size)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Process-wide arena for runtime metadata.
///
/// # Examples
///
/// ```
/// use finch_mem::arena::global_arena;
///
/// let value: &'static mut u32 = global_arena().alloc(42u32);
/// assert_eq!(*value, 42);
/// ```
#[must_use]
pub fn global_arena() -> &'static GlobalArena {
    static ARENA: OnceLock<GlobalArena> = OnceLock::new();
    ARENA.get_or_init(|| GlobalArena::new(GLOBAL_CHUNK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_allocation() {
        let arena = GlobalArena::new(8192);

        let a = arena.alloc(42u32);
        let b = arena.alloc(100u64);

        assert_eq!(*a, 42);
        assert_eq!(*b, 100);
    }

    #[test]
    fn test_alignment_respected() {
        #[repr(align(64))]
        struct Wide(u8);

        let arena = GlobalArena::new(8192);
        arena.alloc(1u8);
        let wide = arena.alloc(Wide(3));

        assert_eq!(std::ptr::from_mut(wide).addr() % 64, 0);
        assert_eq!(wide.0, 3);
    }

    #[test]
    fn test_chunk_growth() {
        let arena = GlobalArena::new(8192);

        let values: Vec<&mut [u8; 1024]> = (0..32).map(|i| arena.alloc([i as u8; 1024])).collect();

        for (i, value) in values.iter().enumerate() {
            assert!(value.iter().all(|&b| b == i as u8));
        }
        assert!(arena.stats().chunk_count > 1);
    }

    #[test]
    fn test_oversized_value() {
        let arena = GlobalArena::new(8192);
        let big = arena.alloc([9u8; 40_000]);

        assert_eq!(big[39_999], 9);
    }

    #[test]
    fn test_thread_safe_allocation() {
        let arena = Arc::new(GlobalArena::new(8192));

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let arena = Arc::clone(&arena);
                thread::spawn(move || {
                    let slots: Vec<*const u64> = (0..500)
                        .map(|i| std::ptr::from_ref(arena.alloc(t * 1000 + i)))
                        .collect();
                    slots.into_iter().map(|p| p.addr()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut addrs: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = addrs.len();
        addrs.sort_unstable();
        addrs.dedup();

        // No slot was handed out twice
        assert_eq!(addrs.len(), total);
    }

    #[test]
    fn test_stats() {
        let arena = GlobalArena::new(8192);
        arena.alloc(42u32);
        arena.alloc(100u64);

        let stats = arena.stats();
        assert_eq!(stats.total_allocated, 12);
        assert_eq!(stats.chunk_count, 1);
        assert!(stats.total_capacity >= 8192);
    }

    #[test]
    fn test_contains() {
        let arena = GlobalArena::new(8192);
        let first = &*arena.alloc(1u64);
        let big = &*arena.alloc([0u8; 9000]);
        let other = GlobalArena::new(8192);
        let foreign = &*other.alloc(1u64);

        assert_eq!(arena.stats().chunk_count, 2);
        assert!(arena.contains(first));
        assert!(arena.contains(big));
        assert!(!arena.contains(foreign));
        assert!(!arena.contains(&0u64));
    }

    #[test]
    fn test_global_arena_singleton() {
        assert!(std::ptr::eq(global_arena(), global_arena()));
    }
}
