// src/backend/limits.rs

//! POSIX rlimit-based memory ceiling for unit processes.
//!
//! On Unix the limit is applied inside a `pre_exec` hook, executed in the
//! child after `fork()` and immediately before `execve()`, so the process
//! never runs without the restriction. On non-Unix platforms the request is
//! logged as a warning and treated as a no-op.

use tokio::process::Command;

/// Attach a hard address-space ceiling (`RLIMIT_AS`) to a unit command.
pub fn attach_memory_limit(cmd: &mut Command, memory_limit_bytes: u64) {
    #[cfg(unix)]
    {
        unix_impl::attach_memory_limit(cmd, memory_limit_bytes);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
        tracing::warn!(
            memory_limit_bytes,
            "memory ceiling requested on a non-Unix OS; limit will be ignored"
        );
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    pub fn attach_memory_limit(cmd: &mut Command, memory_limit_bytes: u64) {
        unsafe {
            cmd.pre_exec(move || {
                let rlim = libc::rlimit {
                    rlim_cur: memory_limit_bytes as libc::rlim_t,
                    rlim_max: memory_limit_bytes as libc::rlim_t,
                };
                if libc::setrlimit(libc::RLIMIT_AS, &rlim) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }
}
