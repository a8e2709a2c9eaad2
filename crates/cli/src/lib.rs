use std::env;
use std::path::PathBuf;

pub mod commands;

/// Resolve an optional flag value, falling back to the named environment
/// variable when the flag is absent. Flags always win; the caller supplies
/// any final hardcoded default.
pub fn flag_or_env(flag: Option<PathBuf>, var: &str) -> Option<PathBuf> {
    flag.or_else(|| env::var_os(var).map(PathBuf::from))
}

/// Default benchmark-data directory when neither flag nor environment set one.
pub fn default_data_dir() -> PathBuf {
    PathBuf::from("bhive/benchmark")
}

/// Default output directory when neither flag nor environment set one.
pub fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
