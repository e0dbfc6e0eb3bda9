//! Common definitions shared between the wiretap driver, the interposition
//! shim and the relay program.
//!
//! Everything that crosses a process boundary lives here: the environment
//! keys that activate a tracing session, and the flag tokens of the relay
//! argument vector. The shim works with C strings and the driver with Rust
//! strings, so both spellings are provided and kept in sync by tests.

pub mod env;
pub mod flags;
pub mod platform;

pub use env::*;
pub use flags::*;
