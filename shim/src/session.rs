//! Session capture from the process environment block.
//!
//! The session is built exactly once, when the shim is loaded, and never
//! mutated afterwards. Its fields are non-owning views into the environment
//! strings the process was started with; they stay valid for the life of the
//! process as long as nobody rewrites the environment block, which is the
//! same assumption `getenv` callers make.

use std::ffi::CStr;
use std::os::raw::c_char;

use wiretap_protocol::env as keys;

/// Per-process interception configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Session<'a> {
    /// Path to the relay program.
    pub reporter: Option<&'a CStr>,
    /// Where the relay appends its reports.
    pub destination: Option<&'a CStr>,
    /// The shim library to propagate into children.
    pub library: Option<&'a CStr>,
    /// Forward `--verbose` to the relay.
    pub verbose: bool,
}

impl<'a> Session<'a> {
    /// A session activates interception only when the reporter, destination
    /// and library are all present. Anything less disables the shim for the
    /// whole process.
    pub fn is_valid(&self) -> bool {
        self.reporter.is_some() && self.destination.is_some() && self.library.is_some()
    }

    /// The three required fields, or `None` when the session is incomplete.
    pub fn required(&self) -> Option<(&'a CStr, &'a CStr, &'a CStr)> {
        Some((self.reporter?, self.destination?, self.library?))
    }
}

/// Capture a session from a raw environment block.
///
/// Capture is total: a null `envp`, an empty list, or absent keys all yield
/// an all-absent (invalid) session, never an error. The null pointer is
/// never dereferenced.
///
/// # Safety
///
/// `envp` must be null or point to a null-terminated array of nul-terminated
/// strings that outlive `'a`.
pub unsafe fn capture<'a>(envp: *const *const c_char) -> Session<'a> {
    let mut session = Session::default();
    if envp.is_null() {
        return session;
    }

    let mut it = envp;
    while !(*it).is_null() {
        let entry = CStr::from_ptr(*it);
        if let Some((key, value)) = split(entry) {
            if key == keys::C_KEY_DESTINATION.to_bytes() {
                session.destination = Some(value);
            } else if key == keys::C_KEY_LIBRARY.to_bytes() {
                session.library = Some(value);
            } else if key == keys::C_KEY_REPORTER.to_bytes() {
                session.reporter = Some(value);
            } else if key == keys::C_KEY_VERBOSE.to_bytes() {
                session.verbose = value.to_bytes() == b"true";
            }
        }
        it = it.add(1);
    }
    session
}

/// Split a `KEY=value` entry. The value is returned as a sub-`CStr` of the
/// entry (same allocation, same trailing nul), so no copy is made.
fn split(entry: &CStr) -> Option<(&[u8], &CStr)> {
    let bytes = entry.to_bytes();
    let eq = bytes.iter().position(|&b| b == b'=')?;
    // Safety: `eq + 1` is at most the nul terminator's index, so the tail is
    // itself a valid nul-terminated string within the entry.
    let value = unsafe { CStr::from_ptr(entry.as_ptr().add(eq + 1)) };
    Some((&bytes[..eq], value))
}
