//! Property-based tests for path confinement.
//!
//! # Properties
//!
//! 1. Accepted paths always lie inside the canonical root
//! 2. Paths that climb above the root are always rejected
//! 3. Null bytes are always rejected
//! 4. Plain relative paths are accepted and map to `root/<path>`
//!
//! Run with:
//! ```bash
//! cargo test --lib security::property_tests
//! ```

use proptest::prelude::*;
use tempfile::TempDir;

use super::{PathTraversalError, resolve_within_root};

// ============================================================================
// Strategies
// ============================================================================

fn path_string_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_./\\\\-]{0,80}").expect("valid regex")
}

/// Components without separators, excluding `.` and `..`.
fn path_component_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-][a-zA-Z0-9_.-]{0,30}")
        .expect("valid regex")
        .prop_filter("exclude special dirs", |s| s != "." && s != "..")
}

fn valid_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(path_component_strategy(), 1..5).prop_map(|parts| parts.join("/"))
}

/// Paths that always end up above the root.
fn escape_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just("../secret".to_string()),
        Just("../../etc/passwd".to_string()),
        Just("..\\..\\windows".to_string()),
        valid_path_strategy().prop_map(|p| format!("../{p}")),
        valid_path_strategy().prop_map(|p| {
            let depth = p.split('/').count() + 1;
            format!("{p}/{}", vec![".."; depth].join("/"))
        }),
    ]
}

fn null_byte_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("\0".to_string()),
        path_component_strategy().prop_map(|s| format!("{s}\0")),
        path_component_strategy().prop_map(|s| format!("\0{s}")),
        valid_path_strategy().prop_map(|p| format!("{p}/\0.png")),
    ]
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #[test]
    fn accepted_paths_stay_inside_root(input in path_string_strategy()) {
        let root = TempDir::new().unwrap();
        let canonical_root = root.path().canonicalize().unwrap();

        if let Ok(confined) = resolve_within_root(root.path(), &input) {
            prop_assert!(
                confined.path().starts_with(&canonical_root),
                "{:?} resolved outside the root: {:?}",
                input,
                confined.path()
            );
        }
    }

    #[test]
    fn escapes_are_rejected(input in escape_strategy()) {
        let root = TempDir::new().unwrap();
        prop_assert_eq!(
            resolve_within_root(root.path(), &input),
            Err(PathTraversalError::EscapesRoot)
        );
    }

    #[test]
    fn null_bytes_are_rejected(input in null_byte_strategy()) {
        let root = TempDir::new().unwrap();
        prop_assert_eq!(
            resolve_within_root(root.path(), &input),
            Err(PathTraversalError::NullByte)
        );
    }

    #[test]
    fn relative_paths_map_under_root(input in valid_path_strategy()) {
        let root = TempDir::new().unwrap();
        let canonical_root = root.path().canonicalize().unwrap();

        let confined = resolve_within_root(root.path(), &input).unwrap();
        let expected = canonical_root.join(&input);
        prop_assert_eq!(confined.path(), expected.as_path());
        prop_assert_eq!(confined.display_relative(), input);
    }
}
