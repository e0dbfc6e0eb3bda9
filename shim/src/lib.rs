//! Wiretap interposition shim — preloaded into every traced process.
//!
//! Built as a cdylib and injected via LD_PRELOAD (Linux) or
//! DYLD_INSERT_LIBRARIES (macOS). The exported functions below shadow the
//! libc process-creation family; each one re-encodes its call into a relay
//! invocation and dispatches it through the genuine libc implementation, so
//! the relay program starts in place of the original target, records the
//! call, and re-executes the real program itself.
//!
//! When the session environment is absent or a genuine symbol cannot be
//! found, interception is disabled and every entry point delegates straight
//! to the genuine function of its own name. A traced build must never break
//! just because it cannot be observed.

pub mod encode;
pub mod executor;
pub mod resolver;
pub mod session;

use std::ffi::CStr;
use std::mem;
use std::sync::OnceLock;

use libc::{c_char, c_int, pid_t, posix_spawn_file_actions_t, posix_spawnattr_t};
use log::debug;

use executor::Executor;
use resolver::DlNext;
use session::Session;

#[cfg(target_os = "macos")]
fn environment() -> *const *const c_char {
    // Safety: _NSGetEnviron is the sanctioned way to reach environ from a
    // dylib on macOS.
    unsafe { *libc::_NSGetEnviron() as *const *const c_char }
}

#[cfg(not(target_os = "macos"))]
fn environment() -> *const *const c_char {
    extern "C" {
        static environ: *const *const c_char;
    }
    unsafe { environ }
}

/// The process-global session, captured once from the environment block.
static SESSION: OnceLock<Session<'static>> = OnceLock::new();

fn current_session() -> Session<'static> {
    // Normally initialized by the load-time constructor; the lazy path
    // covers a call racing in before constructors have run.
    *SESSION.get_or_init(|| unsafe { session::capture(environment()) })
}

fn shim_init() {
    let session = unsafe { session::capture(environment()) };
    if session.is_valid() {
        // Only a traced process gets a logger; a bare library load (e.g. a
        // stray LD_PRELOAD without session variables) stays silent.
        let _ = env_logger::try_init();
        debug!(
            "interception active (verbose={}), reporting via {:?}",
            session.verbose, session.reporter
        );
    }
    let _ = SESSION.set(session);
}

#[cfg(all(target_os = "linux", not(test)))]
#[unsafe(link_section = ".init_array")]
#[used]
static INIT: extern "C" fn() = {
    extern "C" fn init() {
        shim_init();
    }
    init
};

#[cfg(all(target_os = "macos", not(test)))]
#[unsafe(link_section = "__DATA,__mod_init_func")]
#[used]
static INIT: extern "C" fn() = {
    extern "C" fn init() {
        shim_init();
    }
    init
};

#[cfg(target_os = "linux")]
unsafe fn set_errno(value: c_int) {
    *libc::__errno_location() = value;
}

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
unsafe fn set_errno(value: c_int) {
    *libc::__error() = value;
}

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
type ExecvPFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const *const c_char,
    *const *const c_char,
) -> c_int;

/// Genuine-call fallback for the exec family. Resolves the next definition
/// of the entry point's own name, so `execve` keeps its no-search semantics
/// and the search-path variants keep theirs.
unsafe fn genuine_exec(
    name: &CStr,
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    match resolver::next_symbol(name) {
        Some(addr) => {
            let fp: resolver::ExecveFn = mem::transmute(addr);
            fp(file, argv, envp)
        }
        None => {
            set_errno(libc::ENOENT);
            -1
        }
    }
}

/// Genuine-call fallback for the spawn family. Failure is reported in the
/// native `posix_spawn` convention: an errno value, not -1.
unsafe fn genuine_spawn(
    name: &CStr,
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    match resolver::next_symbol(name) {
        Some(addr) => {
            let fp: resolver::SpawnFn = mem::transmute(addr);
            fp(pid, file, file_actions, attrp, argv, envp)
        }
        None => libc::ENOENT,
    }
}

/// # Safety
/// Called by the C runtime with the contract of the real `execve`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let session = current_session();
    match Executor::new(&session, &DlNext).execve(path, argv, envp) {
        Ok(status) => status,
        Err(err) => {
            debug!("execve not intercepted: {err}");
            genuine_exec(c"execve", path, argv, envp)
        }
    }
}

/// # Safety
/// Called by the C runtime with the contract of the real `execvpe`.
#[cfg(not(target_os = "macos"))]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let session = current_session();
    match Executor::new(&session, &DlNext).execvpe(file, argv, envp) {
        Ok(status) => status,
        Err(err) => {
            debug!("execvpe not intercepted: {err}");
            genuine_exec(c"execvpe", file, argv, envp)
        }
    }
}

/// # Safety
/// Called by the C runtime with the contract of the real `execvP`.
#[cfg(any(target_os = "macos", target_os = "freebsd"))]
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn execvP(
    file: *const c_char,
    search_path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let session = current_session();
    match Executor::new(&session, &DlNext).execv_p(file, search_path, argv, envp) {
        Ok(status) => status,
        Err(err) => {
            debug!("execvP not intercepted: {err}");
            match resolver::next_symbol(c"execvP") {
                Some(addr) => {
                    let fp: ExecvPFn = mem::transmute(addr);
                    fp(file, search_path, argv, envp)
                }
                None => {
                    set_errno(libc::ENOENT);
                    -1
                }
            }
        }
    }
}

/// # Safety
/// Called by the C runtime with the contract of the real `posix_spawn`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_spawn(
    pid: *mut pid_t,
    path: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    let session = current_session();
    match Executor::new(&session, &DlNext)
        .posix_spawn(pid, path, file_actions, attrp, argv, envp)
    {
        Ok(status) => status,
        Err(err) => {
            debug!("posix_spawn not intercepted: {err}");
            genuine_spawn(c"posix_spawn", pid, path, file_actions, attrp, argv, envp)
        }
    }
}

/// # Safety
/// Called by the C runtime with the contract of the real `posix_spawnp`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_spawnp(
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const posix_spawn_file_actions_t,
    attrp: *const posix_spawnattr_t,
    argv: *const *mut c_char,
    envp: *const *mut c_char,
) -> c_int {
    let session = current_session();
    match Executor::new(&session, &DlNext)
        .posix_spawnp(pid, file, file_actions, attrp, argv, envp)
    {
        Ok(status) => status,
        Err(err) => {
            debug!("posix_spawnp not intercepted: {err}");
            genuine_spawn(c"posix_spawnp", pid, file, file_actions, attrp, argv, envp)
        }
    }
}
