//! Build metadata
//!
//! Compile-time constants stamped by build.rs, surfaced in the status tool
//! and the startup banner so a bug report can name the exact build.

use serde::Serialize;

/// Build number, incremented by build.rs on each compilation
pub const BUILD_NUMBER: u64 = match option_env!("MEALTRACK_BUILD_NUMBER") {
    Some(s) => match parse_u64(s) {
        Some(n) => n,
        None => 0,
    },
    None => 0,
};

/// Build timestamp in ISO 8601 format
pub const BUILD_TIMESTAMP: &str = match option_env!("MEALTRACK_BUILD_TIMESTAMP") {
    Some(s) => s,
    None => "unknown",
};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Package description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// option_env! hands us a &str; u64::from_str is not const, so parse by hand.
// A malformed stamp parses as None and the build number falls back to 0.
const fn parse_u64(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    let mut result: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < b'0' || b > b'9' {
            return None;
        }
        result = result * 10 + (b - b'0') as u64;
        i += 1;
    }
    Some(result)
}

/// Build information structure for serialization
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub description: &'static str,
}

impl BuildInfo {
    /// Get the current build info
    pub fn current() -> Self {
        Self {
            name: NAME,
            version: VERSION,
            build_number: BUILD_NUMBER,
            build_timestamp: BUILD_TIMESTAMP,
            description: DESCRIPTION,
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

/// Print the startup banner to stderr (stdout belongs to the MCP transport)
pub fn print_startup_banner() {
    let info = BuildInfo::current();
    eprintln!("===============================================");
    eprintln!("  {} - {}", info.name, info.description);
    eprintln!("  Version: {} | Build: {}", info.version, info.build_number);
    eprintln!("  Compiled: {}", info.build_timestamp);
    eprintln!("===============================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_digits() {
        assert_eq!(parse_u64("0"), Some(0));
        assert_eq!(parse_u64("417"), Some(417));
    }

    #[test]
    fn test_parse_u64_rejects_non_digits() {
        assert_eq!(parse_u64(""), Some(0));
        assert_eq!(parse_u64("12a"), None);
        assert_eq!(parse_u64("-1"), None);
    }

    #[test]
    fn test_build_info_matches_package() {
        let info = BuildInfo::current();
        assert_eq!(info.name, "mealtrack");
        assert_eq!(info.version, VERSION);
    }
}
