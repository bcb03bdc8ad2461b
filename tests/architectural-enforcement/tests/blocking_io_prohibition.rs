//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async functions in the bridge MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::io::stdin`.
//!
//! Blocking calls in plain functions are allowed (config loading before the
//! runtime starts, for example).

use architectural_enforcement::{find_blocking_io_violations, production_sources};

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<_> = production_sources()
        .iter()
        .flat_map(|(path, content)| find_blocking_io_violations(path, content))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in async code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nUse the async equivalents:");
        eprintln!("  - tokio::fs::read_to_string().await");
        eprintln!("  - tokio::net::UnixStream::connect().await");
        eprintln!("  - tokio::io::BufReader::new(tokio::io::stdin())");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.",
            violations.len()
        );
    }
}
