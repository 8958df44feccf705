//! Command-line differencing and option scanning
//!
//! A wrapper such as `uv run --with-requirements reqs.txt script.py` execs
//! into `python script.py`, preserving the trailing arguments. Subtracting
//! the child's argument count from the wrapper's command line therefore
//! leaves the wrapper-owned prefix. This is a positional heuristic: it only
//! holds while the wrapper preserves the tail verbatim.

use crate::domain::CommandLine;
use crate::error::{EnvError, Result};

/// Tokens after this are positional, never options
const END_OF_OPTIONS: &str = "--";

/// Return the first `len(wrapper) - len(self_args)` tokens of `wrapper`.
///
/// # Errors
/// - `AssumptionViolated` if `wrapper` is shorter than `self_args`
/// - `AssumptionViolated` if the wrapper's tail differs from `self_args`
pub fn wrapper_prefix(wrapper: &CommandLine, self_args: &[String]) -> Result<CommandLine> {
    let tokens = wrapper.tokens();
    let split = tokens.len().checked_sub(self_args.len()).ok_or_else(|| {
        EnvError::AssumptionViolated(format!(
            "wrapper command line has {} tokens but the current process has {} arguments: {:?}",
            tokens.len(),
            self_args.len(),
            tokens
        ))
    })?;

    let (prefix, tail) = tokens.split_at(split);
    if tail != self_args {
        return Err(EnvError::AssumptionViolated(format!(
            "wrapper command line does not end with the current process arguments: \
             expected tail {:?}, found {:?}",
            self_args, tail
        )));
    }

    Ok(CommandLine::new(prefix.to_vec()))
}

/// Value of an optional-argument option (`--name value` or `--name=value`).
///
/// Last occurrence wins. A bare `--name` followed by another option yields
/// no value.
pub fn option_value<'a>(tokens: &'a [String], name: &str) -> Option<&'a str> {
    let mut found = None;
    let mut iter = options(tokens).peekable();
    while let Some(token) = iter.next() {
        if token == name {
            found = iter.next_if(|next| !next.starts_with('-')).map(String::as_str);
        } else if let Some(value) = inline_value(token, name) {
            found = Some(value);
        }
    }
    found
}

/// True if a boolean flag is present
pub fn has_flag(tokens: &[String], name: &str) -> bool {
    options(tokens).any(|token| token == name)
}

/// Remove every occurrence of option `name` together with its value
pub fn strip_option(tokens: &[String], name: &str) -> Vec<String> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut iter = tokens.iter().peekable();
    let mut positional_only = false;
    while let Some(token) = iter.next() {
        if !positional_only {
            if token == END_OF_OPTIONS {
                positional_only = true;
            } else if token == name {
                iter.next_if(|next| !next.starts_with('-'));
                continue;
            } else if inline_value(token, name).is_some() {
                continue;
            }
        }
        kept.push(token.clone());
    }
    kept
}

/// Tokens up to (excluding) the end-of-options marker
fn options(tokens: &[String]) -> impl Iterator<Item = &String> {
    tokens.iter().take_while(|t| *t != END_OF_OPTIONS)
}

fn inline_value<'a>(token: &'a str, name: &str) -> Option<&'a str> {
    token.strip_prefix(name)?.strip_prefix('=')
}
