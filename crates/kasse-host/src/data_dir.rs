// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::ffi::OsStr;
use std::path::PathBuf;

/// Directory holding Kasse's configuration: `$XDG_DATA_HOME/kasse`, else
/// `$HOME/.local/share/kasse`, else `/tmp/kasse`. Unset and empty variables
/// are skipped. Not created; the host only reads from it.
pub fn data_dir() -> PathBuf {
    env_path("XDG_DATA_HOME")
        .or_else(|| env_path("HOME").map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("kasse")
}

fn env_path(var: impl AsRef<OsStr>) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_namespaced() {
        assert!(data_dir().ends_with("kasse"));
    }

    #[test]
    fn unset_variables_are_skipped() {
        assert!(env_path("KASSE_UNSET_FOR_TESTS").is_none());
    }
}
