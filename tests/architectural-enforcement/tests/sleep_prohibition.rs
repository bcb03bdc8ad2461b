//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the bridge MUST NOT call sleep methods.
//! Waiting is done on I/O, channels or `tokio::time::timeout`.

use architectural_enforcement::{find_sleep_violations, production_sources};

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<_> = production_sources()
        .iter()
        .flat_map(|(path, content)| find_sleep_violations(path, content))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nWait on the event instead:");
        eprintln!("  - tokio::time::timeout around the awaited call");
        eprintln!("  - channels or oneshot replies");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_sources_found() {
    assert!(
        !production_sources().is_empty(),
        "no production sources found; check PRODUCTION_DIRS"
    );
}
