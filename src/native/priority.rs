//! Portable priority levels and their mapping onto the host scheduler.
//!
//! The thread's current scheduling policy decides the mapping. Under the Linux
//! time-sharing policies the levels are per-thread nice values (`setpriority`
//! with a kernel thread id targets a single thread there). Under real-time
//! policies, and on every other platform, they are scaled into the
//! `sched_get_priority_min..=max` range of that policy.

use crate::native::thread::OsThread;

use std::io;

/// Relative scheduling priority of a thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Lowest,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    Highest,
}

impl Priority {
    /// Every level, lowest first.
    pub const ALL: [Priority; 5] = [
        Priority::Lowest,
        Priority::BelowNormal,
        Priority::Normal,
        Priority::AboveNormal,
        Priority::Highest,
    ];

    fn index(self) -> i32 {
        self as i32
    }

    /// Nice value applied for this level. Lower is more favourable.
    pub(crate) fn nice(self) -> i32 {
        match self {
            // The kernel clamps to 19; asking for it directly keeps the
            // round trip exact.
            Priority::Lowest => 19,
            Priority::BelowNormal => 10,
            Priority::Normal => 0,
            Priority::AboveNormal => -10,
            Priority::Highest => -20,
        }
    }

    /// Buckets a nice value back into a level.
    pub(crate) fn from_nice(nice: i32) -> Self {
        if nice < -10 {
            Priority::Highest
        } else if nice < 0 {
            Priority::AboveNormal
        } else if nice == 0 {
            Priority::Normal
        } else if nice <= 10 {
            Priority::BelowNormal
        } else {
            Priority::Lowest
        }
    }

    /// Scales this level into a real-time priority range.
    pub(crate) fn scaled(self, min: i32, max: i32) -> i32 {
        min + (max - min) * self.index() / 4
    }

    /// Buckets a real-time priority back into a level.
    pub(crate) fn from_scaled(value: i32, min: i32, max: i32) -> Self {
        if max <= min {
            return Priority::Normal;
        }

        let index = ((value - min) * 4 + (max - min) / 2) / (max - min);
        Priority::ALL[index.clamp(0, 4) as usize]
    }
}

fn sched_range(policy: libc::c_int) -> io::Result<(i32, i32)> {
    let min = unsafe { libc::sched_get_priority_min(policy) };
    let max = unsafe { libc::sched_get_priority_max(policy) };

    if min == -1 || max == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok((min, max))
}

fn sched_params(thread: &OsThread) -> io::Result<(libc::c_int, libc::sched_param)> {
    let mut policy = 0;
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    let res = unsafe { libc::pthread_getschedparam(thread.pthread(), &mut policy, &mut param) };

    if res != 0 {
        return Err(io::Error::from_raw_os_error(res));
    }

    Ok((policy, param))
}

/// True for the time-sharing policies, where levels are nice values.
#[cfg(target_os = "linux")]
fn is_time_sharing(policy: libc::c_int) -> bool {
    matches!(policy, libc::SCHED_OTHER | libc::SCHED_BATCH | libc::SCHED_IDLE)
}

#[cfg(not(target_os = "linux"))]
fn is_time_sharing(_policy: libc::c_int) -> bool {
    false
}

pub(crate) fn get(thread: &OsThread) -> io::Result<Priority> {
    let (policy, param) = sched_params(thread)?;
    if is_time_sharing(policy) {
        return get_nice(thread);
    }

    let (min, max) = sched_range(policy)?;
    Ok(Priority::from_scaled(param.sched_priority, min, max))
}

pub(crate) fn set(thread: &OsThread, level: Priority) -> io::Result<()> {
    let (policy, mut param) = sched_params(thread)?;
    if is_time_sharing(policy) {
        return set_nice(thread, level);
    }

    let (min, max) = sched_range(policy)?;
    param.sched_priority = level.scaled(min, max);
    let res = unsafe { libc::pthread_setschedparam(thread.pthread(), policy, &param) };

    if res != 0 {
        return Err(io::Error::from_raw_os_error(res));
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn get_nice(thread: &OsThread) -> io::Result<Priority> {
    // -1 is a legal nice value, so errno is the only failure signal.
    unsafe { *libc::__errno_location() = 0 };
    let nice = unsafe { libc::getpriority(libc::PRIO_PROCESS, thread.kernel_tid as libc::id_t) };

    if nice == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error().unwrap_or(0) != 0 {
            return Err(err);
        }
    }

    Ok(Priority::from_nice(nice))
}

#[cfg(target_os = "linux")]
fn set_nice(thread: &OsThread, level: Priority) -> io::Result<()> {
    let res = unsafe {
        libc::setpriority(
            libc::PRIO_PROCESS,
            thread.kernel_tid as libc::id_t,
            level.nice(),
        )
    };

    if res != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn get_nice(_thread: &OsThread) -> io::Result<Priority> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(not(target_os = "linux"))]
fn set_nice(_thread: &OsThread, _level: Priority) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}
