//! End-to-end coverage for things the unit tests in `runcmd.rs`/`grammar.rs`
//! don't exercise: environment variables actually reaching the child, and a
//! full `&&`/`;` chain running real processes back to back.

use alpamon_shell::{run_shell_line, runcmd};
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn environment_variables_reach_the_child_process() {
    let mut env = HashMap::new();
    env.insert("ALPAMON_TEST_VAR".to_string(), "from-the-agent".to_string());

    let outcome = runcmd(
        &["/bin/sh".to_string(), "-c".to_string(), "echo $ALPAMON_TEST_VAR".to_string()],
        Some("root"),
        Some("root"),
        Some(env),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.output.trim(), "from-the-agent");
}

#[tokio::test]
async fn mixed_chain_runs_every_reachable_segment() {
    let outcome = run_shell_line("echo one ; echo two && echo three", "root", "root", None)
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.output.contains("one"));
    assert!(outcome.output.contains("two"));
    assert!(outcome.output.contains("three"));
}

#[tokio::test]
async fn or_chain_short_circuits_on_success() {
    let outcome = run_shell_line("echo first || echo unreachable", "root", "root", None)
        .await
        .unwrap();

    assert!(outcome.output.contains("first"));
    assert!(!outcome.output.contains("unreachable"));
}
