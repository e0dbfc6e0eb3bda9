//! Per-call-site interception logic.
//!
//! Every intercepted entry point runs the same sequence: validate the
//! session, resolve the genuine function, size and fill the relay vector,
//! then invoke the genuine function with the relay program as the target.
//! From the traced program's point of view the call behaves exactly like
//! the real one — the process that starts is just the relay instead of the
//! original target.
//!
//! An error from any step means no process was created here; the entry
//! point falls back to the genuine call so the build keeps working even
//! when it cannot be observed.

use std::ptr;

use libc::{c_char, c_int, pid_t, posix_spawn_file_actions_t, posix_spawnattr_t};
use thiserror::Error;

use crate::encode::{self, Execution, LayoutError};
use crate::resolver::Resolver;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The session is incomplete; interception is off for this process.
    #[error("interception disabled: session is incomplete")]
    Disabled,
    /// The genuine symbol could not be located for this call.
    #[error("interception disabled: genuine symbol unavailable")]
    ResolutionFailed,
    /// Encoder contract violation. A defect, not a runtime condition.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

pub struct Executor<'a, R> {
    session: &'a Session<'a>,
    resolver: &'a R,
}

impl<'a, R: Resolver> Executor<'a, R> {
    pub fn new(session: &'a Session<'a>, resolver: &'a R) -> Self {
        Self { session, resolver }
    }

    /// Build the relay vector for one intercepted call.
    ///
    /// The returned buffer borrows the session and the original command; it
    /// must be consumed by the immediately following dispatch.
    unsafe fn encode(&self, execution: &Execution) -> Result<Vec<*const c_char>, ExecutorError> {
        let needed = encode::length(self.session, execution);
        let mut dst = vec![ptr::null(); needed];
        let written = encode::fill(self.session, execution, &mut dst)?;
        debug_assert_eq!(written, needed);
        Ok(dst)
    }

    fn reporter(&self) -> Result<*const c_char, ExecutorError> {
        self.session
            .required()
            .map(|(reporter, _, _)| reporter.as_ptr())
            .ok_or(ExecutorError::Disabled)
    }

    unsafe fn dispatch_exec(
        &self,
        execution: Execution,
        envp: *const *const c_char,
    ) -> Result<c_int, ExecutorError> {
        let reporter = self.reporter()?;
        let fp = self.resolver.execve().ok_or(ExecutorError::ResolutionFailed)?;
        let argv = self.encode(&execution)?;
        Ok(fp(reporter, argv.as_ptr(), envp))
    }

    unsafe fn dispatch_spawn(
        &self,
        pid: *mut pid_t,
        file_actions: *const posix_spawn_file_actions_t,
        attrp: *const posix_spawnattr_t,
        execution: Execution,
        envp: *const *mut c_char,
    ) -> Result<c_int, ExecutorError> {
        let reporter = self.reporter()?;
        let fp = self
            .resolver
            .posix_spawn()
            .ok_or(ExecutorError::ResolutionFailed)?;
        let argv = self.encode(&execution)?;
        Ok(fp(
            pid,
            reporter,
            file_actions,
            attrp,
            argv.as_ptr() as *const *mut c_char,
            envp,
        ))
    }

    /// # Safety
    /// `path`, `argv` and `envp` must satisfy the contract of the real
    /// `execve`: nul-terminated path, null-terminated vectors.
    pub unsafe fn execve(
        &self,
        path: *const c_char,
        argv: *const *const c_char,
        envp: *const *const c_char,
    ) -> Result<c_int, ExecutorError> {
        self.dispatch_exec(Execution::from_path(path, argv), envp)
    }

    /// # Safety
    /// As `execve`, with `file` a name to be searched on the path.
    pub unsafe fn execvpe(
        &self,
        file: *const c_char,
        argv: *const *const c_char,
        envp: *const *const c_char,
    ) -> Result<c_int, ExecutorError> {
        self.dispatch_exec(Execution::from_file(file, argv), envp)
    }

    /// # Safety
    /// As `execvpe`, with an explicit search path override.
    pub unsafe fn execv_p(
        &self,
        file: *const c_char,
        search_path: *const c_char,
        argv: *const *const c_char,
        envp: *const *const c_char,
    ) -> Result<c_int, ExecutorError> {
        self.dispatch_exec(Execution::from_file_in(file, search_path, argv), envp)
    }

    /// # Safety
    /// Arguments must satisfy the contract of the real `posix_spawn`.
    pub unsafe fn posix_spawn(
        &self,
        pid: *mut pid_t,
        path: *const c_char,
        file_actions: *const posix_spawn_file_actions_t,
        attrp: *const posix_spawnattr_t,
        argv: *const *mut c_char,
        envp: *const *mut c_char,
    ) -> Result<c_int, ExecutorError> {
        self.dispatch_spawn(
            pid,
            file_actions,
            attrp,
            Execution::from_path(path, argv as *const *const c_char),
            envp,
        )
    }

    /// # Safety
    /// Arguments must satisfy the contract of the real `posix_spawnp`.
    pub unsafe fn posix_spawnp(
        &self,
        pid: *mut pid_t,
        file: *const c_char,
        file_actions: *const posix_spawn_file_actions_t,
        attrp: *const posix_spawnattr_t,
        argv: *const *mut c_char,
        envp: *const *mut c_char,
    ) -> Result<c_int, ExecutorError> {
        self.dispatch_spawn(
            pid,
            file_actions,
            attrp,
            Execution::from_file(file, argv as *const *const c_char),
            envp,
        )
    }
}
