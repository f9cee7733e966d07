//! CPU affinity pinning for host threads driving spin-mode handles.
//!
//! Not part of the sequence protocol itself — a convenience for hosts that
//! dedicate a core to a busy-spinning producer or consumer thread, the way
//! a latency-sensitive disruptor deployment typically would.

use crate::error::{Result, RingError};

/// Pin the calling thread to a single CPU core.
///
/// `cpu` is a 0-based core index. A no-op on platforms without a known
/// affinity API.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(cpu)
        .map_err(|e| RingError::config(format!("invalid cpu index {cpu}: {e}")))?;
    // Pid 0 means "the calling thread" to `sched_setaffinity`.
    sched_setaffinity(Pid::from_raw(0), &set)
        .map_err(|e| RingError::unexpected(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(target_os = "macos")]
pub fn pin_current_thread(cpu: usize) -> Result<()> {
    use libc::{mach_port_t, pthread_self, thread_policy_set, THREAD_AFFINITY_POLICY};

    // macOS has no hard-affinity syscall; `THREAD_AFFINITY_POLICY` is an
    // advisory tag grouping threads that share one, not a pin to `cpu`
    // itself, so out-of-range tags are accepted rather than rejected.
    unsafe {
        let mut policy = libc::thread_affinity_policy_data_t {
            affinity_tag: cpu as libc::c_int,
        };
        let result = thread_policy_set(
            pthread_self() as mach_port_t,
            THREAD_AFFINITY_POLICY as u32,
            &mut policy as *mut _ as *mut libc::c_int,
            1,
        );
        if result != 0 {
            return Err(RingError::unexpected("thread_policy_set failed"));
        }
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn pin_current_thread(_cpu: usize) -> Result<()> {
    Ok(())
}
