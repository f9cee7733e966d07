//! C1: shared region layout & mapper.
//!
//! Creates or opens the POSIX shared-memory object backing a disruptor ring
//! and caches typed pointers into it.

use std::ffi::CString;
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::config::DisruptorConfig;
use crate::constants::{SEQUENCE_WIDTH, SHM_CREATE_MODE, STATUS_WIDTH};
use crate::error::{Result, RingError};

/// The mapped shared-memory region, with cached offsets into it.
///
/// Owns the mapping for the lifetime of the handle; `Drop` unmaps it. Does
/// not own the backing shared-memory *object* — that persists until every
/// process has unmapped it and something calls `shm_unlink` (this crate
/// never unlinks automatically; only the initializer's create path
/// unlink-and-recreates on a name collision).
pub(crate) struct SharedRegion {
    base: *mut u8,
    len: usize,
    header_len: usize,
    num_consumers: u32,
    num_elements: u64,
    element_size: u32,
}

// SAFETY: `base` points at `MAP_SHARED` memory; all access to the counters
// goes through atomics and all access to element bytes is mediated by the
// CAS-based claim/commit/consume protocol in `handle.rs`, so sharing a
// `SharedRegion` across threads within one process is sound as long as
// callers uphold the single-threaded-per-handle discipline the protocol requires.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create (or, on a name collision, unlink-and-recreate) the shared
    /// memory object and zero-fill it (the "init" path).
    pub(crate) fn create(cfg: &DisruptorConfig) -> Result<Self> {
        let name = shm_name_cstr(&cfg.shm_name)?;
        let total_len = total_len(cfg.num_consumers, cfg.num_elements, cfg.element_size);

        let fd = unsafe {
            let mut fd = libc::shm_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                SHM_CREATE_MODE as libc::c_uint,
            );
            if fd < 0 && std::io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
                tracing::debug!(name = %cfg.shm_name, "shm object exists, unlinking and recreating");
                libc::shm_unlink(name.as_ptr());
                fd = libc::shm_open(
                    name.as_ptr(),
                    libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                    SHM_CREATE_MODE as libc::c_uint,
                );
            }
            fd
        };
        if fd < 0 {
            return Err(RingError::Io(std::io::Error::last_os_error()));
        }

        let result = (|| {
            if unsafe { libc::ftruncate(fd, total_len as libc::off_t) } < 0 {
                return Err(RingError::Io(std::io::Error::last_os_error()));
            }
            map_region(
                fd,
                total_len,
                cfg.num_consumers,
                cfg.num_elements as u64,
                cfg.element_size,
            )
        })();

        unsafe {
            libc::close(fd);
        }

        let region = result?;
        tracing::debug!(
            name = %cfg.shm_name,
            num_elements = cfg.num_elements,
            element_size = cfg.element_size,
            num_consumers = cfg.num_consumers,
            "created shared region"
        );
        Ok(region)
    }

    /// Open an existing shared memory object without creating it (the
    /// "not init" path, no create). Geometry is taken on faith from `cfg`;
    /// this crate does not validate it against the region's actual size —
    /// see `DisruptorConfig`'s `Serialize`/`Deserialize` for how callers
    /// are expected to agree on geometry out-of-band instead.
    pub(crate) fn open(cfg: &DisruptorConfig) -> Result<Self> {
        let name = shm_name_cstr(&cfg.shm_name)?;
        let total_len = total_len(cfg.num_consumers, cfg.num_elements, cfg.element_size);

        let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(RingError::Io(std::io::Error::last_os_error()));
        }

        let result = map_region(
            fd,
            total_len,
            cfg.num_consumers,
            cfg.num_elements as u64,
            cfg.element_size,
        );

        unsafe {
            libc::close(fd);
        }

        let region = result?;
        tracing::debug!(name = %cfg.shm_name, "opened shared region");
        Ok(region)
    }

    #[inline]
    pub(crate) fn consumer_seq(&self, index: u32) -> &AtomicU64 {
        debug_assert!(index < self.num_consumers);
        unsafe { &*(self.base.add(index as usize * SEQUENCE_WIDTH) as *const AtomicU64) }
    }

    #[inline]
    pub(crate) fn cursor(&self) -> &AtomicU64 {
        let offset = self.num_consumers as usize * SEQUENCE_WIDTH;
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }

    #[inline]
    pub(crate) fn next(&self) -> &AtomicU64 {
        let offset = self.num_consumers as usize * SEQUENCE_WIDTH + SEQUENCE_WIDTH;
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }

    #[inline]
    pub(crate) fn status(&self) -> &AtomicU32 {
        let offset = self.num_consumers as usize * SEQUENCE_WIDTH + 2 * SEQUENCE_WIDTH;
        unsafe { &*(self.base.add(offset) as *const AtomicU32) }
    }

    /// Raw mutable pointer to the start of a slot. Caller must ensure the
    /// slot index is in range and that exclusive/shared access to the bytes
    /// is correctly mediated by the sequence protocol.
    #[inline]
    pub(crate) unsafe fn slot_ptr(&self, slot_index: u64) -> *mut u8 {
        debug_assert!(slot_index < self.num_elements);
        self.base
            .add(self.header_len + slot_index as usize * self.element_size as usize)
    }

    #[inline]
    pub(crate) fn element_size(&self) -> u32 {
        self.element_size
    }

    #[inline]
    pub(crate) fn num_elements(&self) -> u64 {
        self.num_elements
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unregister_mapping(self.base as usize, self.len);
        unsafe {
            if libc::munmap(self.base as *mut libc::c_void, self.len) < 0 {
                tracing::warn!(
                    error = %std::io::Error::last_os_error(),
                    "munmap failed while dropping shared region"
                );
            }
        }
    }
}

fn shm_name_cstr(name: &str) -> Result<CString> {
    CString::new(name)
        .map_err(|_| RingError::config("shm_name must not contain interior NUL bytes"))
}

fn total_len(num_consumers: u32, num_elements: u32, element_size: u32) -> usize {
    header_len(num_consumers) + num_elements as usize * element_size as usize
}

fn header_len(num_consumers: u32) -> usize {
    num_consumers as usize * SEQUENCE_WIDTH + 2 * SEQUENCE_WIDTH + STATUS_WIDTH
}

fn map_region(
    fd: libc::c_int,
    total_len: usize,
    num_consumers: u32,
    num_elements: u64,
    element_size: u32,
) -> Result<SharedRegion> {
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            total_len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(RingError::Io(std::io::Error::last_os_error()));
    }
    let base = base as *mut u8;

    if let Err(e) = register_mapping(base as usize, total_len) {
        unsafe {
            libc::munmap(base as *mut libc::c_void, total_len);
        }
        return Err(e);
    }

    Ok(SharedRegion {
        base,
        len: total_len,
        header_len: header_len(num_consumers),
        num_consumers,
        num_elements,
        element_size,
    })
}

// Address-collision detection.
//
// Standard `mmap(NULL, ...)` cannot hand back an address range that
// overlaps another currently-active mapping in this process, so in
// practice this registry's overlap branch is unreachable through ordinary
// use; it exists to turn a latent platform-specific mmap quirk (the kind
// the original native addon worked around) into a clear, catchable error
// instead of silent memory corruption, and to guard against the same
// process racing to create/open the same shared object twice.
fn registry() -> &'static Mutex<Vec<(usize, usize)>> {
    static REGISTRY: OnceLock<Mutex<Vec<(usize, usize)>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Vec::new()))
}

fn register_mapping(base: usize, len: usize) -> Result<()> {
    if cfg!(feature = "skip_collision_check") {
        return Ok(());
    }
    let mut active = registry().lock();
    let new_end = base + len;
    for &(existing_base, existing_len) in active.iter() {
        let existing_end = existing_base + existing_len;
        if base < existing_end && existing_base < new_end {
            return Err(RingError::collision(format!(
                "mapping {:#x}..{:#x} overlaps active mapping {:#x}..{:#x}",
                base, new_end, existing_base, existing_end
            )));
        }
    }
    active.push((base, len));
    Ok(())
}

fn unregister_mapping(base: usize, len: usize) {
    registry().lock().retain(|&(b, l)| (b, l) != (base, len));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(name: &str) -> DisruptorConfig {
        DisruptorConfig::new(name, 8, 4).with_consumer(1, 0)
    }

    #[test]
    fn header_len_accounts_for_all_counters() {
        // 3 consumers * 8 + cursor(8) + next(8) + status(4)
        assert_eq!(header_len(3), 3 * 8 + 8 + 8 + 4);
    }

    #[test]
    fn create_then_open_share_geometry() {
        let name = "/ring-disruptor-test-create-open";
        let _ = unsafe { libc::shm_unlink(CString::new(name).unwrap().as_ptr()) };

        let cfg = test_config(name).with_init(true);
        let region = SharedRegion::create(&cfg).unwrap();
        assert_eq!(region.num_elements(), 8);
        assert_eq!(region.element_size(), 4);
        assert_eq!(region.cursor().load(std::sync::atomic::Ordering::SeqCst), 0);

        let joiner_cfg = test_config(name);
        let joined = SharedRegion::open(&joiner_cfg).unwrap();
        joined.cursor().store(5, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(region.cursor().load(std::sync::atomic::Ordering::SeqCst), 5);

        drop(region);
        drop(joined);
        unsafe {
            libc::shm_unlink(CString::new(name).unwrap().as_ptr());
        }
    }

    #[test]
    fn create_recreates_on_name_collision() {
        let name = "/ring-disruptor-test-recreate";
        let _ = unsafe { libc::shm_unlink(CString::new(name).unwrap().as_ptr()) };

        let cfg = test_config(name).with_init(true);
        let first = SharedRegion::create(&cfg).unwrap();
        first.next().store(42, std::sync::atomic::Ordering::SeqCst);
        drop(first);

        // Second create should unlink-and-recreate, zero-filled again.
        let second = SharedRegion::create(&cfg).unwrap();
        assert_eq!(second.next().load(std::sync::atomic::Ordering::SeqCst), 0);

        drop(second);
        unsafe {
            libc::shm_unlink(CString::new(name).unwrap().as_ptr());
        }
    }

    #[test]
    fn open_without_create_fails_when_missing() {
        let name = "/ring-disruptor-test-missing";
        let _ = unsafe { libc::shm_unlink(CString::new(name).unwrap().as_ptr()) };

        let cfg = test_config(name);
        assert!(SharedRegion::open(&cfg).is_err());
    }
}
