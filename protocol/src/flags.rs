//! Flag tokens of the relay argument vector.
//!
//! The shim emits these in a fixed order: the relay program path as argv[0],
//! the session flags, then the execution flags, then `--exec-command`
//! followed by the original command vector verbatim. The relay parses its
//! own argv against the same tokens. There is no versioning; the schema is
//! fixed.

use std::ffi::CStr;

pub const FLAG_DESTINATION: &CStr = c"--report-destination";
pub const FLAG_LIBRARY: &CStr = c"--session-library";
pub const FLAG_VERBOSE: &CStr = c"--verbose";
pub const FLAG_PATH: &CStr = c"--exec-path";
pub const FLAG_FILE: &CStr = c"--exec-file";
pub const FLAG_SEARCH_PATH: &CStr = c"--exec-search_path";
pub const FLAG_COMMAND: &CStr = c"--exec-command";
