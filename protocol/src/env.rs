//! Environment keys of a tracing session.
//!
//! The driver installs these four variables in the build's environment; the
//! shim reads them back from the environment block of every traced process.
//! A session is usable only when the first three are all present.

use std::ffi::CStr;

/// Where the relay appends its execution reports.
pub const KEY_DESTINATION: &str = "INTERCEPT_REPORT_DESTINATION";

/// The shim library to propagate into child processes.
pub const KEY_LIBRARY: &str = "INTERCEPT_SESSION_LIBRARY";

/// The relay program that receives re-encoded process creations.
pub const KEY_REPORTER: &str = "INTERCEPT_REPORT_COMMAND";

/// Verbose relay output; enabled iff the value is exactly `"true"`.
pub const KEY_VERBOSE: &str = "INTERCEPT_VERBOSE";

pub const C_KEY_DESTINATION: &CStr = c"INTERCEPT_REPORT_DESTINATION";
pub const C_KEY_LIBRARY: &CStr = c"INTERCEPT_SESSION_LIBRARY";
pub const C_KEY_REPORTER: &CStr = c"INTERCEPT_REPORT_COMMAND";
pub const C_KEY_VERBOSE: &CStr = c"INTERCEPT_VERBOSE";
