//! Startup step restricting which CPUs the process may run on.

use crate::Result;

/// Restrict the current process to the CPUs it is allowed to use, minus the
/// first `reserved` of them.
///
/// Returns the CPUs the process is now bound to, or `None` when nothing was
/// changed: either the platform has no affinity API, or too few CPUs are
/// available to give any away.
pub fn reserve_threads(reserved: usize) -> Result<Option<Vec<usize>>> {
    let Some(allowed) = sys::allowed_cpus()? else {
        log::warn!("CPU affinity is not supported on this platform, using every thread");
        return Ok(None);
    };

    let Some(remaining) = remaining_cpus(&allowed, reserved) else {
        log::warn!(
            "only {} CPU thread(s) available, not reserving {reserved}",
            allowed.len()
        );
        return Ok(None);
    };

    sys::set_allowed_cpus(&remaining)?;
    log::info!(
        "Restricted to {} of {} CPU thread(s): {remaining:?}",
        remaining.len(),
        allowed.len()
    );
    Ok(Some(remaining))
}

/// Drop the `reserved` lowest CPUs. `None` if that would leave nothing.
fn remaining_cpus(allowed: &[usize], reserved: usize) -> Option<Vec<usize>> {
    let mut sorted = allowed.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let remaining = sorted.split_off(reserved.min(sorted.len()));
    (!remaining.is_empty()).then_some(remaining)
}

#[cfg(target_os = "linux")]
mod sys {
    use std::mem::{size_of, zeroed};

    use crate::{Error, Result};

    pub fn allowed_cpus() -> Result<Option<Vec<usize>>> {
        // SAFETY: cpu_set_t is plain data and the kernel writes at most its size.
        let mut set: libc::cpu_set_t = unsafe { zeroed() };
        let rc = unsafe { libc::sched_getaffinity(0, size_of::<libc::cpu_set_t>(), &mut set) };
        if rc != 0 {
            return Err(Error::Resource(format!(
                "sched_getaffinity failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        let cpus = (0..libc::CPU_SETSIZE as usize)
            .filter(|cpu| unsafe { libc::CPU_ISSET(*cpu, &set) })
            .collect();
        Ok(Some(cpus))
    }

    pub fn set_allowed_cpus(cpus: &[usize]) -> Result<()> {
        let mut set: libc::cpu_set_t = unsafe { zeroed() };
        for cpu in cpus {
            unsafe { libc::CPU_SET(*cpu, &mut set) };
        }

        let rc = unsafe { libc::sched_setaffinity(0, size_of::<libc::cpu_set_t>(), &set) };
        if rc != 0 {
            return Err(Error::Resource(format!(
                "sched_setaffinity failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use crate::Result;

    pub fn allowed_cpus() -> Result<Option<Vec<usize>>> {
        Ok(None)
    }

    pub fn set_allowed_cpus(_: &[usize]) -> Result<()> {
        Ok(())
    }
}
