// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

const VERSION: &str = env!("SHIPPER_VERSION");

/// The version exactly as it was provided at build time.
#[must_use]
pub fn full() -> &'static str {
    VERSION
}

/// The version for logs and the user agent: release versions are kept as is,
/// commit hashes are shortened to 7 characters.
#[must_use]
pub fn display() -> &'static str {
    shorten(VERSION)
}

#[must_use]
pub fn user_agent() -> String {
    format!("nomad-shipper/{}", display())
}

fn shorten(version: &str) -> &str {
    if version.contains('.') {
        return version;
    }
    version.get(..7).unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_versions_are_kept() {
        assert_eq!(shorten("1.4.2"), "1.4.2");
        assert_eq!(shorten("1.4.2-rc.1+build.20250101"), "1.4.2-rc.1+build.20250101");
    }

    #[test]
    fn commit_hashes_are_shortened() {
        assert_eq!(shorten("3f9c2a17be0d4c61"), "3f9c2a1");
    }

    #[test]
    fn short_names_are_kept() {
        assert_eq!(shorten("dev"), "dev");
        assert_eq!(shorten("abcdefg"), "abcdefg");
    }

    #[test]
    fn user_agent_names_the_shipper() {
        assert!(user_agent().starts_with("nomad-shipper/"));
        assert!(!full().is_empty());
    }
}
