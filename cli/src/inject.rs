//! Shim discovery and child environment assembly.
//!
//! The driver does not perform the injection itself — it only locates the
//! shim library and the relay program on disk, and installs the session
//! variables plus the platform's preload variable in the build's
//! environment. The dynamic loader does the rest.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use wiretap_protocol::env as keys;
use wiretap_protocol::platform;

/// Find a program in PATH.
fn find_in_path(program: &str) -> Option<PathBuf> {
    std::env::var_os("PATH")?
        .to_str()?
        .split(':')
        .map(|dir| PathBuf::from(dir).join(program))
        .find(|path| path.is_file())
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|c| c.exists())
}

fn canonical(path: PathBuf) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize path: {}", path.display()))
}

/// Locate the shim library.
///
/// Searched in order: development target directories, the `lib/` directory
/// next to the installed binary, the platform's library directories, and
/// finally the `WIRETAP_SHIM_LIB` override.
pub fn find_shim_library() -> Result<PathBuf> {
    let lib_name = platform::shim_lib_name();

    let mut candidates: Vec<PathBuf> = vec![
        format!("./target/release/{lib_name}").into(),
        format!("./target/debug/{lib_name}").into(),
    ];
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(&lib_name));
            candidates.push(exe_dir.join("..").join("lib").join(&lib_name));
        }
    }
    for install_path in platform::installed_lib_paths() {
        candidates.push(install_path.join(&lib_name));
    }

    if let Some(found) = first_existing(candidates) {
        return canonical(found);
    }
    if let Some(path) = std::env::var_os("WIRETAP_SHIM_LIB") {
        let path = PathBuf::from(path);
        if path.exists() {
            return canonical(path);
        }
    }

    anyhow::bail!(
        "Shim library not found. Build with 'cargo build --release' or set WIRETAP_SHIM_LIB"
    )
}

/// Locate the relay program that children will be rerouted through.
pub fn find_relay() -> Result<PathBuf> {
    const RELAY_NAME: &str = "wiretap-relay";

    let mut candidates: Vec<PathBuf> = vec![
        format!("./target/release/{RELAY_NAME}").into(),
        format!("./target/debug/{RELAY_NAME}").into(),
    ];
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(RELAY_NAME));
        }
    }

    if let Some(found) = first_existing(candidates) {
        return canonical(found);
    }
    if let Some(found) = find_in_path(RELAY_NAME) {
        return canonical(found);
    }

    anyhow::bail!("Relay program '{RELAY_NAME}' not found; pass --reporter explicitly")
}

fn entry(key: &str, value: &Path) -> Option<CString> {
    let mut bytes = Vec::with_capacity(key.len() + 1 + value.as_os_str().len());
    bytes.extend_from_slice(key.as_bytes());
    bytes.push(b'=');
    bytes.extend_from_slice(value.as_os_str().as_bytes());
    CString::new(bytes).ok()
}

/// Assemble the build's environment: the inherited variables, the four
/// session keys, and the platform's preload variable pointing at the shim.
///
/// Session keys and the preload variable are stripped from the inherited
/// set first, so a nested driver invocation starts a fresh session instead
/// of mixing two.
pub fn session_environment(
    destination: &Path,
    library: &Path,
    reporter: &Path,
    verbose: bool,
) -> Vec<CString> {
    let preload_var = platform::PRELOAD_ENV_VAR;

    let mut entries: Vec<CString> = Vec::new();
    for (key, value) in std::env::vars_os() {
        let Some(key_str) = key.to_str() else {
            continue;
        };
        if key_str.starts_with("INTERCEPT_") || Some(key_str) == preload_var {
            continue;
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(b'=');
        bytes.extend_from_slice(value.as_bytes());
        if let Ok(e) = CString::new(bytes) {
            entries.push(e);
        }
    }

    entries.extend(entry(keys::KEY_DESTINATION, destination));
    entries.extend(entry(keys::KEY_LIBRARY, library));
    entries.extend(entry(keys::KEY_REPORTER, reporter));
    if verbose {
        if let Ok(e) = CString::new(format!("{}=true", keys::KEY_VERBOSE)) {
            entries.push(e);
        }
    }
    if let Some(preload) = preload_var {
        entries.extend(entry(preload, library));
        debug!("preloading shim via {preload}");
    }

    entries
}
