//! Build identification, stamped by vergen at compile time.

use std::fmt;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git metadata captured when the crate was built.
///
/// Fields read `"unknown"` for builds outside a git checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub sha: &'static str,
    pub dirty: bool,
}

impl BuildInfo {
    /// Metadata of the running binary.
    pub fn current() -> Self {
        Self {
            version: PKG_VERSION,
            branch: option_env!("VERGEN_GIT_BRANCH").unwrap_or("unknown"),
            sha: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
        }
    }

    /// First seven characters of the commit SHA.
    pub fn short_sha(&self) -> &'static str {
        self.sha.get(..7).unwrap_or(self.sha)
    }
}

/// `{version}+{branch}.{sha}`, with `.dirty` appended for modified trees.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}.{}", self.version, self.branch, self.short_sha())?;
        if self.dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}

/// Full version string of the running binary.
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}

/// `User-Agent` sent to upstream APIs.
pub fn user_agent() -> String {
    format!("snapfeed/{PKG_VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(sha: &'static str, dirty: bool) -> BuildInfo {
        BuildInfo {
            version: "0.1.0",
            branch: "main",
            sha,
            dirty,
        }
    }

    #[test]
    fn display_truncates_sha() {
        assert_eq!(
            info("abc1234def5678", false).to_string(),
            "0.1.0+main.abc1234"
        );
    }

    #[test]
    fn dirty_tree_is_marked() {
        assert_eq!(info("abc1234def", true).to_string(), "0.1.0+main.abc1234.dirty");
    }

    #[test]
    fn unknown_sha_is_kept_whole() {
        assert_eq!(info("unknown", false).to_string(), "0.1.0+main.unknown");
    }

    #[test]
    fn current_starts_with_pkg_version() {
        assert!(version_string().starts_with(PKG_VERSION));
        assert!(user_agent().ends_with(PKG_VERSION));
    }
}
