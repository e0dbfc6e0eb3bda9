//! Process-control primitives used by the driver.
//!
//! Thin wrappers over the POSIX spawn/wait/identity/temp-file calls. Every
//! fallible operation reports failure as a value carrying the operation's
//! name and the platform's error text in one diagnostic string; nothing
//! here panics or exits.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::ptr;

use libc::{c_char, c_int, pid_t};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Spawn(String),
    #[error("{0}")]
    Wait(String),
    #[error("{0}")]
    Cwd(String),
    #[error("{0}")]
    TempFile(String),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

fn describe(operation: &str, error: io::Error) -> String {
    format!("{operation}: {error}")
}

fn null_terminated(items: &[CString]) -> Vec<*mut c_char> {
    let mut ptrs: Vec<*mut c_char> = items.iter().map(|s| s.as_ptr() as *mut c_char).collect();
    ptrs.push(ptr::null_mut());
    ptrs
}

/// Spawn `argv` with `posix_spawn`; `argv[0]` is the executable path, not
/// searched.
pub fn spawn(argv: &[CString], envp: &[CString]) -> Result<pid_t> {
    let program = argv
        .first()
        .ok_or_else(|| ProcessError::Spawn("posix_spawn: empty argument vector".into()))?;
    let argv_ptrs = null_terminated(argv);
    let envp_ptrs = null_terminated(envp);

    let mut pid: pid_t = 0;
    let status = unsafe {
        libc::posix_spawn(
            &mut pid,
            program.as_ptr(),
            ptr::null(),
            ptr::null(),
            argv_ptrs.as_ptr(),
            envp_ptrs.as_ptr(),
        )
    };
    if status != 0 {
        return Err(ProcessError::Spawn(describe(
            &format!("posix_spawn '{}'", program.to_string_lossy()),
            io::Error::from_raw_os_error(status),
        )));
    }
    Ok(pid)
}

/// Spawn `argv` with `posix_spawnp`, resolving `file` using the platform's
/// search-path semantics.
pub fn spawnp(file: &CStr, argv: &[CString], envp: &[CString]) -> Result<pid_t> {
    let argv_ptrs = null_terminated(argv);
    let envp_ptrs = null_terminated(envp);

    let mut pid: pid_t = 0;
    let status = unsafe {
        libc::posix_spawnp(
            &mut pid,
            file.as_ptr(),
            ptr::null(),
            ptr::null(),
            argv_ptrs.as_ptr(),
            envp_ptrs.as_ptr(),
        )
    };
    if status != 0 {
        return Err(ProcessError::Spawn(describe(
            &format!("posix_spawnp '{}'", file.to_string_lossy()),
            io::Error::from_raw_os_error(status),
        )));
    }
    Ok(pid)
}

/// Block until `pid` terminates and return its exit code. A child killed by
/// a signal maps to `EXIT_FAILURE`, never a raw signal number.
pub fn wait_pid(pid: pid_t) -> Result<c_int> {
    let mut status: c_int = 0;
    if unsafe { libc::waitpid(pid, &mut status, 0) } == -1 {
        return Err(ProcessError::Wait(describe(
            "waitpid",
            io::Error::last_os_error(),
        )));
    }
    if libc::WIFEXITED(status) {
        Ok(libc::WEXITSTATUS(status))
    } else {
        Ok(libc::EXIT_FAILURE)
    }
}

pub fn get_pid() -> pid_t {
    unsafe { libc::getpid() }
}

pub fn get_ppid() -> pid_t {
    unsafe { libc::getppid() }
}

/// The current working directory as an absolute path.
///
/// Paths longer than the 8192-byte internal buffer fail with `Cwd`; that
/// buffer is a hard ceiling.
pub fn get_cwd() -> Result<PathBuf> {
    const BUFFER_SIZE: usize = 8192;
    let mut buffer = [0u8; BUFFER_SIZE];
    if unsafe { libc::getcwd(buffer.as_mut_ptr() as *mut c_char, BUFFER_SIZE) }.is_null() {
        return Err(ProcessError::Cwd(describe(
            "getcwd",
            io::Error::last_os_error(),
        )));
    }
    let cwd = unsafe { CStr::from_ptr(buffer.as_ptr() as *const c_char) };
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(cwd.to_bytes())))
}

/// An exclusively created file with a randomized unique name.
#[derive(Debug)]
pub struct UniqueFile {
    pub path: PathBuf,
    pub file: File,
}

/// Create and open a unique file named `<prefix><random><suffix>`.
///
/// Creation is atomic: `mkstemps` creates with `O_CREAT|O_EXCL`, so two
/// callers can never race into the same name. `prefix` may carry a
/// directory component.
pub fn temp_file(prefix: &str, suffix: &str) -> Result<UniqueFile> {
    let template = CString::new(format!("{prefix}XXXXXX{suffix}"))
        .map_err(|_| ProcessError::TempFile("mkstemps: template contains nul byte".into()))?;
    let mut template = template.into_bytes_with_nul();

    let fd = unsafe {
        libc::mkstemps(template.as_mut_ptr() as *mut c_char, suffix.len() as c_int)
    };
    if fd == -1 {
        return Err(ProcessError::TempFile(describe(
            "mkstemps",
            io::Error::last_os_error(),
        )));
    }

    // mkstemps rewrote the placeholder in the template with the unique name.
    template.pop(); // trailing nul
    let path = PathBuf::from(std::ffi::OsStr::from_bytes(&template));
    let file = unsafe { File::from_raw_fd(fd) };
    Ok(UniqueFile { path, file })
}
