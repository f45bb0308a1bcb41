//! Named binary semaphores.
//!
//! A thin safe wrapper over POSIX named semaphores (`sem_open` and
//! friends), provided so external orchestration tooling can sequence
//! process startup and shutdown around the server.  Not part of the storage
//! protocol: the server never touches these itself.

use std::ffi::CString;
use std::io;

use crate::error::StorError;

/// A named POSIX semaphore, created with an initial value of zero.
pub struct Semaphore {
    sem: *mut libc::sem_t,
    name: CString,
}

// The handle is only a pointer into the C library's semaphore object; the
// sem_* calls themselves are thread-safe.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

/// Normalize a caller-supplied name to the `/name` form `sem_open` requires.
fn sem_name(name: &str) -> Result<CString, StorError> {
    let normalized = if name.starts_with('/') {
        name.to_owned()
    } else {
        format!("/{name}")
    };
    CString::new(normalized)
        .map_err(|e| StorError::InvalidArgument(format!("semaphore name: {e}")))
}

impl Semaphore {
    /// Open the semaphore `name`, creating it with value zero if it does
    /// not exist yet.
    pub fn open(name: &str) -> Result<Self, StorError> {
        let name = sem_name(name)?;
        let sem = unsafe {
            libc::sem_open(
                name.as_ptr(),
                libc::O_CREAT,
                0o644 as libc::mode_t as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(StorError::Internal(format!(
                "sem_open {}: {}",
                name.to_string_lossy(),
                io::Error::last_os_error()
            )));
        }
        Ok(Self { sem, name })
    }

    /// Post the semaphore, waking one waiter or storing the signal.
    pub fn signal(&self) -> Result<(), StorError> {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            return Err(StorError::Internal(format!(
                "sem_post {}: {}",
                self.name.to_string_lossy(),
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Block until the semaphore is signalled.
    pub fn wait(&self) -> Result<(), StorError> {
        loop {
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(StorError::Internal(format!(
                "sem_wait {}: {err}",
                self.name.to_string_lossy()
            )));
        }
    }

    /// Take the semaphore if it is currently signalled.
    ///
    /// Returns `false` when the value is zero.
    pub fn try_wait(&self) -> Result<bool, StorError> {
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => {
                    return Err(StorError::Internal(format!(
                        "sem_trywait {}: {err}",
                        self.name.to_string_lossy()
                    )));
                }
            }
        }
    }

    /// Remove `name` from the system.
    ///
    /// Existing handles stay usable until closed; reopening the name after
    /// an unlink yields a fresh semaphore.
    pub fn unlink(name: &str) -> Result<(), StorError> {
        let name = sem_name(name)?;
        if unsafe { libc::sem_unlink(name.as_ptr()) } != 0 {
            return Err(StorError::Internal(format!(
                "sem_unlink {}: {}",
                name.to_string_lossy(),
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("libstor-test-{tag}-{}", std::process::id())
    }

    #[test]
    fn signal_then_wait() {
        let name = unique_name("wait");
        let sem = Semaphore::open(&name).expect("open");
        sem.signal().expect("signal");
        sem.wait().expect("wait");
        Semaphore::unlink(&name).expect("unlink");
    }

    #[test]
    fn try_wait_reports_state() {
        let name = unique_name("try");
        let sem = Semaphore::open(&name).expect("open");
        assert!(!sem.try_wait().expect("empty try_wait"));
        sem.signal().expect("signal");
        assert!(sem.try_wait().expect("signalled try_wait"));
        assert!(!sem.try_wait().expect("drained try_wait"));
        Semaphore::unlink(&name).expect("unlink");
    }

    #[test]
    fn signal_crosses_threads() {
        let name = unique_name("threads");
        let sem = Semaphore::open(&name).expect("open");
        let signaller = Semaphore::open(&name).expect("open second handle");

        let worker = std::thread::spawn(move || {
            signaller.signal().expect("signal");
        });
        sem.wait().expect("wait");
        worker.join().expect("join");
        Semaphore::unlink(&name).expect("unlink");
    }

    #[test]
    fn unlink_twice_fails() {
        let name = unique_name("unlink");
        let _sem = Semaphore::open(&name).expect("open");
        Semaphore::unlink(&name).expect("first unlink");
        assert!(Semaphore::unlink(&name).is_err());
    }
}
