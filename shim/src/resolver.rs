//! Genuine-symbol resolution.
//!
//! The shim's own entry points carry the same names as the libc functions
//! they replace, so calling them by name from inside the shim would recurse
//! forever. `dlsym(RTLD_NEXT, ..)` asks the dynamic loader for the *next*
//! definition in the symbol search order, which from a preloaded object is
//! the genuine libc implementation.

use std::ffi::CStr;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use libc::{
    c_char, c_int, c_void, pid_t, posix_spawn_file_actions_t, posix_spawnattr_t, RTLD_NEXT,
};

/// Signature of the genuine `execve`-family function.
pub type ExecveFn = unsafe extern "C" fn(
    *const c_char,
    *const *const c_char,
    *const *const c_char,
) -> c_int;

/// Signature of the genuine `posix_spawn`-family function.
pub type SpawnFn = unsafe extern "C" fn(
    *mut pid_t,
    *const c_char,
    *const posix_spawn_file_actions_t,
    *const posix_spawnattr_t,
    *const *mut c_char,
    *const *mut c_char,
) -> c_int;

/// Capability interface yielding the genuine process-creation functions.
///
/// Concrete implementations are selected at composition time; the executor
/// is generic over this trait so tests can substitute a recording fake.
pub trait Resolver {
    /// Address of the genuine `execve`, if it can be located.
    fn execve(&self) -> Option<ExecveFn>;

    /// Address of the genuine `posix_spawn`, if it can be located.
    fn posix_spawn(&self) -> Option<SpawnFn>;
}

/// One lazily resolved symbol address.
///
/// A successful lookup is cached and reused; a failed lookup is *not*
/// cached, so a transient loader hiccup does not poison later attempts.
/// Concurrent first calls may each run `dlsym`, which is idempotent — every
/// thread observes either zero or the one genuine address.
pub(crate) struct Symbol {
    name: &'static CStr,
    address: AtomicUsize,
}

impl Symbol {
    pub(crate) const fn new(name: &'static CStr) -> Self {
        Self {
            name,
            address: AtomicUsize::new(0),
        }
    }

    pub(crate) fn resolve(&self) -> Option<*mut c_void> {
        let cached = self.address.load(Ordering::Acquire);
        if cached != 0 {
            return Some(cached as *mut c_void);
        }
        let found = unsafe { libc::dlsym(RTLD_NEXT, self.name.as_ptr()) };
        if found.is_null() {
            return None;
        }
        self.address.store(found as usize, Ordering::Release);
        Some(found)
    }
}

static NEXT_EXECVE: Symbol = Symbol::new(c"execve");
static NEXT_POSIX_SPAWN: Symbol = Symbol::new(c"posix_spawn");

/// Resolver backed by the dynamic loader's `RTLD_NEXT` search.
pub struct DlNext;

impl Resolver for DlNext {
    fn execve(&self) -> Option<ExecveFn> {
        // Safety: the address came from dlsym for this exact symbol name,
        // whose C prototype matches `ExecveFn`.
        NEXT_EXECVE
            .resolve()
            .map(|addr| unsafe { mem::transmute::<*mut c_void, ExecveFn>(addr) })
    }

    fn posix_spawn(&self) -> Option<SpawnFn> {
        NEXT_POSIX_SPAWN
            .resolve()
            .map(|addr| unsafe { mem::transmute::<*mut c_void, SpawnFn>(addr) })
    }
}

/// Uncached next-definition lookup for an arbitrary symbol name.
///
/// Used by the disabled-interception fallback, where each entry point
/// delegates to the genuine function of its own name so search-path
/// semantics are preserved exactly.
pub fn next_symbol(name: &CStr) -> Option<*mut c_void> {
    let found = unsafe { libc::dlsym(RTLD_NEXT, name.as_ptr()) };
    if found.is_null() {
        None
    } else {
        Some(found)
    }
}
