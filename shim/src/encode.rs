//! Re-encoding an intercepted call into the relay argument vector.
//!
//! Two passes, always in this order: `length` computes the exact number of
//! vector slots, the caller acquires a buffer of that size, and `fill`
//! writes it with bounds checking. A mismatch between the passes is a
//! defect in this module, not a runtime condition — `fill` refuses to write
//! past the buffer and reports `LayoutError` instead.
//!
//! The vector stores borrowed pointers only: into the session's environment
//! strings, the flag token constants, and the intercepted call's own
//! command vector. It must not outlive the process-creation call it is
//! built for.

use std::os::raw::c_char;
use std::ptr;

use thiserror::Error;
use wiretap_protocol::flags;

use crate::session::Session;

/// One intercepted process creation, prior to encoding.
///
/// Exactly one of `path` (absolute target, execve/posix_spawn) or `file`
/// (name to be searched, execvpe/posix_spawnp) is set; `search_path` only
/// accompanies `file` for the execvP variant. `command` is the original
/// null-terminated argument vector, owned by the intercepted caller.
#[derive(Clone, Copy)]
pub struct Execution {
    pub command: *const *const c_char,
    pub path: *const c_char,
    pub file: *const c_char,
    pub search_path: *const c_char,
}

impl Execution {
    pub fn from_path(path: *const c_char, command: *const *const c_char) -> Self {
        Self {
            command,
            path,
            file: ptr::null(),
            search_path: ptr::null(),
        }
    }

    pub fn from_file(file: *const c_char, command: *const *const c_char) -> Self {
        Self {
            command,
            path: ptr::null(),
            file,
            search_path: ptr::null(),
        }
    }

    pub fn from_file_in(
        file: *const c_char,
        search_path: *const c_char,
        command: *const *const c_char,
    ) -> Self {
        Self {
            command,
            path: ptr::null(),
            file,
            search_path,
        }
    }
}

/// Sizing/fill contract violation. Never expected in correct use; the
/// executor maps it onto the intercepted call's ordinary failure path
/// rather than aborting the host process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("relay vector capacity exceeded: slot {attempted} of {capacity}")]
    CapacityExceeded { attempted: usize, capacity: usize },
    #[error("cannot encode an incomplete session")]
    IncompleteSession,
}

/// Number of entries before the null terminator of a C string array.
///
/// # Safety
/// `array` must be null or null-terminated.
pub unsafe fn array_length(array: *const *const c_char) -> usize {
    if array.is_null() {
        return 0;
    }
    let mut len = 0;
    while !(*array.add(len)).is_null() {
        len += 1;
    }
    len
}

fn session_length(session: &Session) -> usize {
    // reporter (argv[0]) + two flag/value pairs + optional --verbose
    if session.verbose {
        6
    } else {
        5
    }
}

unsafe fn execution_length(execution: &Execution) -> usize {
    let pairs = [execution.path, execution.file, execution.search_path]
        .iter()
        .filter(|p| !p.is_null())
        .count();
    // flag/value pairs + --exec-command marker + command + null terminator
    pairs * 2 + array_length(execution.command) + 2
}

/// Exact number of slots the relay vector occupies, terminator included.
///
/// # Safety
/// `execution.command` must be null or null-terminated.
pub unsafe fn length(session: &Session, execution: &Execution) -> usize {
    session_length(session) + execution_length(execution)
}

struct Writer<'a> {
    dst: &'a mut [*const c_char],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn push(&mut self, value: *const c_char) -> Result<(), LayoutError> {
        if self.pos >= self.dst.len() {
            return Err(LayoutError::CapacityExceeded {
                attempted: self.pos,
                capacity: self.dst.len(),
            });
        }
        self.dst[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    fn push_pair(&mut self, flag: *const c_char, value: *const c_char) -> Result<(), LayoutError> {
        self.push(flag)?;
        self.push(value)
    }
}

/// Fill `dst` with the relay argument vector and return the number of slots
/// written, the trailing null included.
///
/// Layout: reporter, `--report-destination <path>`, `--session-library
/// <path>`, optional `--verbose`, the execution flags, then `--exec-command`
/// followed by the original command verbatim and a null terminator.
///
/// # Safety
/// `execution.command` must be null or null-terminated, and all pointers in
/// the session and execution must stay valid until the vector is consumed.
pub unsafe fn fill(
    session: &Session,
    execution: &Execution,
    dst: &mut [*const c_char],
) -> Result<usize, LayoutError> {
    let (reporter, destination, library) =
        session.required().ok_or(LayoutError::IncompleteSession)?;

    let mut out = Writer { dst, pos: 0 };

    out.push(reporter.as_ptr())?;
    out.push_pair(flags::FLAG_DESTINATION.as_ptr(), destination.as_ptr())?;
    out.push_pair(flags::FLAG_LIBRARY.as_ptr(), library.as_ptr())?;
    if session.verbose {
        out.push(flags::FLAG_VERBOSE.as_ptr())?;
    }

    if !execution.path.is_null() {
        out.push_pair(flags::FLAG_PATH.as_ptr(), execution.path)?;
    }
    if !execution.file.is_null() {
        out.push_pair(flags::FLAG_FILE.as_ptr(), execution.file)?;
    }
    if !execution.search_path.is_null() {
        out.push_pair(flags::FLAG_SEARCH_PATH.as_ptr(), execution.search_path)?;
    }

    out.push(flags::FLAG_COMMAND.as_ptr())?;
    let command_len = array_length(execution.command);
    for i in 0..command_len {
        out.push(*execution.command.add(i))?;
    }
    out.push(ptr::null())?;

    Ok(out.pos)
}
