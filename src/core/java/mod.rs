pub mod paths;

pub use paths::{java_exe, resolve_java_executable};
