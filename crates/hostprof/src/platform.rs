use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of host platforms every probe dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Macos,
    Freebsd,
    Windows,
    Other,
}

impl Platform {
    /// Map an OS family/name pair (as in `std::env::consts::{FAMILY, OS}`)
    /// to a platform. Total: anything unrecognized is `Other`.
    pub fn classify(family: &str, os: &str) -> Self {
        let family = family.to_ascii_lowercase();
        let os = os.to_ascii_lowercase();
        match (family.as_str(), os.as_str()) {
            ("unix", "linux") => Platform::Linux,
            ("unix", "macos" | "darwin") => Platform::Macos,
            ("unix", "freebsd") => Platform::Freebsd,
            ("windows" | "win32", _) => Platform::Windows,
            _ => Platform::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Freebsd => "freebsd",
            Platform::Windows => "windows",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_pairs() {
        assert_eq!(Platform::classify("unix", "linux"), Platform::Linux);
        assert_eq!(Platform::classify("unix", "macos"), Platform::Macos);
        assert_eq!(Platform::classify("unix", "darwin"), Platform::Macos);
        assert_eq!(Platform::classify("unix", "freebsd"), Platform::Freebsd);
        assert_eq!(Platform::classify("windows", "windows"), Platform::Windows);
        assert_eq!(Platform::classify("win32", "nt"), Platform::Windows);
    }

    #[test]
    fn test_classify_unrecognized_is_other() {
        assert_eq!(Platform::classify("unix", "openbsd"), Platform::Other);
        assert_eq!(Platform::classify("wasm", ""), Platform::Other);
        assert_eq!(Platform::classify("", "linux"), Platform::Other);
    }

    #[test]
    fn test_display_matches_serde_name() {
        let json = serde_json::to_string(&Platform::Freebsd).unwrap();
        assert_eq!(json, format!("\"{}\"", Platform::Freebsd));
    }
}
