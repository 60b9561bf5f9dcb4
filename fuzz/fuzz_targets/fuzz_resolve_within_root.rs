//! Fuzz target for `resolve_within_root`.
//!
//! Builds a small tree under a temporary root (optionally with a symlink
//! pointing outside it) and checks that every accepted path stays inside the
//! canonical root.
//!
//! Key security properties tested:
//! - Accepted paths are always descendants of the canonical root
//! - Symlinks pointing outside the root are never followed out of it
//! - Null bytes and absolute paths are always rejected
//! - No input panics
//!
//! Run with: `cargo +nightly fuzz run fuzz_resolve_within_root`

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use snapwatch::security::{PathTraversalError, resolve_within_root};
use tempfile::tempdir;

#[derive(Arbitrary, Debug)]
struct ResolveInput {
    user_path: String,
    scenario: Scenario,
    with_escape_link: bool,
}

#[derive(Arbitrary, Debug)]
enum Scenario {
    /// Path used as-is
    Raw,
    /// `../` repeated before the path
    Traversal { depth: u8 },
    /// Path nested under existing directories
    Nested { depth: u8 },
    /// Backslash separators
    Backslashes,
    /// Path routed through the escape symlink
    ViaLink,
}

impl ResolveInput {
    fn build_path(&self) -> String {
        match &self.scenario {
            Scenario::Raw => self.user_path.clone(),
            Scenario::Traversal { depth } => {
                format!("{}{}", "../".repeat(usize::from(*depth).min(16)), self.user_path)
            }
            Scenario::Nested { depth } => {
                let nesting = (0..usize::from(*depth).min(8))
                    .map(|_| "shots")
                    .collect::<Vec<_>>()
                    .join("/");
                format!("{nesting}/{}", self.user_path)
            }
            Scenario::Backslashes => self.user_path.replace('/', "\\"),
            Scenario::ViaLink => format!("link/{}", self.user_path),
        }
    }
}

fuzz_target!(|input: ResolveInput| {
    let Ok(outer) = tempdir() else { return };
    let root = outer.path().join("root");
    let outside = outer.path().join("outside");
    if std::fs::create_dir_all(root.join("shots")).is_err() || std::fs::create_dir(&outside).is_err() {
        return;
    }

    #[cfg(unix)]
    if input.with_escape_link {
        let _ = std::os::unix::fs::symlink(&outside, root.join("link"));
    }

    let Ok(canonical_root) = root.canonicalize() else { return };
    let candidate = input.build_path();

    match resolve_within_root(&root, &candidate) {
        Ok(confined) => {
            assert!(
                confined.path().starts_with(&canonical_root),
                "accepted {candidate:?} as {:?}, outside {canonical_root:?}",
                confined.path()
            );
            assert!(!candidate.contains('\0'));
        }
        Err(PathTraversalError::RootUnavailable) => {
            panic!("root exists but was reported unavailable");
        }
        Err(_) => {}
    }
});
