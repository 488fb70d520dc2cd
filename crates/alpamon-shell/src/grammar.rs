//! Splits a shell command line into `&&`/`||`/`;`-joined segments and runs
//! each segment through [`crate::runcmd`] in turn, mirroring the
//! original's token-by-token `handle_shell_cmd` loop rather than handing
//! the line to `/bin/sh -c`.

use crate::error::ShellError;
use crate::runcmd::{runcmd, CommandOutcome, DEFAULT_TIMEOUT};
use std::collections::HashMap;
use std::time::Duration;

/// How a segment's exit status controls whether the next one runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joiner {
    /// `&&`: run the next segment only if this one succeeded.
    And,
    /// `||`: run the next segment only if this one failed.
    Or,
    /// `;`: always run the next segment.
    Then,
}

/// A whitespace/quote-aware tokenizer equivalent to Python's `shlex.split`,
/// scoped to the quoting alpacon command lines actually use.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Groups tokens into segments split on bare `&&`, `||`, and `;` tokens
/// (also accepting `;` as a token suffix, e.g. `echo hi;`).
fn split_segments(tokens: Vec<String>) -> Vec<(Vec<String>, Option<Joiner>)> {
    let mut segments = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token.as_str() {
            "&&" => {
                segments.push((std::mem::take(&mut current), Some(Joiner::And)));
            }
            "||" => {
                segments.push((std::mem::take(&mut current), Some(Joiner::Or)));
            }
            ";" => {
                segments.push((std::mem::take(&mut current), Some(Joiner::Then)));
            }
            t if t.ends_with(';') && t.len() > 1 => {
                current.push(t[..t.len() - 1].to_string());
                segments.push((std::mem::take(&mut current), Some(Joiner::Then)));
            }
            t => current.push(t.to_string()),
        }
    }
    if !current.is_empty() {
        segments.push((current, None));
    }
    segments
}

/// Runs a full shell command line as `username`/`groupname` (root unless
/// told otherwise), honoring `&&`/`||`/`;` between segments. Returns the
/// last segment's exit code and the concatenated output of every segment
/// that ran.
pub async fn run_shell_line(
    line: &str,
    username: &str,
    groupname: &str,
    env: Option<HashMap<String, String>>,
) -> Result<CommandOutcome, ShellError> {
    run_shell_line_with_timeout(line, username, groupname, env, DEFAULT_TIMEOUT).await
}

pub async fn run_shell_line_with_timeout(
    line: &str,
    username: &str,
    groupname: &str,
    env: Option<HashMap<String, String>>,
    timeout: Duration,
) -> Result<CommandOutcome, ShellError> {
    let segments = split_segments(tokenize(line));
    let mut exit_code = 0;
    let mut output = String::new();

    for (args, joiner) in segments {
        if args.is_empty() {
            continue;
        }
        let outcome = runcmd(&args, Some(username), Some(groupname), env.clone(), timeout).await?;
        exit_code = outcome.exit_code;
        output.push_str(&outcome.output);

        match joiner {
            Some(Joiner::And) if exit_code != 0 => return Ok(CommandOutcome { exit_code, output }),
            Some(Joiner::Or) if exit_code == 0 => return Ok(CommandOutcome { exit_code, output }),
            _ => {}
        }
    }

    Ok(CommandOutcome { exit_code, output })
}
