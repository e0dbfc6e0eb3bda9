//! Platform-specific constants and utilities.
//!
//! Centralizes platform-dependent values to avoid scattered #[cfg] blocks.

use std::path::PathBuf;

/// Library file extension for the current platform.
pub const LIB_EXTENSION: &str = if cfg!(target_os = "macos") {
    "dylib"
} else {
    "so"
};

/// Returns the shim library filename for the current platform.
pub fn shim_lib_name() -> String {
    format!("libwiretap_shim.{}", LIB_EXTENSION)
}

/// Environment variable name for library preloading.
/// Returns `None` on platforms without a preload mechanism.
pub const PRELOAD_ENV_VAR: Option<&str> = if cfg!(target_os = "macos") {
    Some("DYLD_INSERT_LIBRARIES")
} else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
    Some("LD_PRELOAD")
} else {
    None
};

/// Returns platform-appropriate library installation directories.
#[cfg(target_os = "macos")]
pub fn installed_lib_paths() -> Vec<PathBuf> {
    vec!["/usr/local/lib".into(), "/opt/homebrew/lib".into()]
}

/// Returns platform-appropriate library installation directories.
#[cfg(not(target_os = "macos"))]
pub fn installed_lib_paths() -> Vec<PathBuf> {
    vec!["/usr/local/lib".into(), "/usr/lib".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_name_has_platform_extension() {
        let name = shim_lib_name();
        assert!(name.starts_with("libwiretap_shim."));
        assert!(name.ends_with(LIB_EXTENSION));
    }

    #[test]
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    fn preload_variable_is_defined() {
        assert!(PRELOAD_ENV_VAR.is_some());
    }
}
