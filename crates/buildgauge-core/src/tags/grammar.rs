//! Tag-item grammar shared by every parse site.
//!
//! Operator-facing tag configuration is newline-separated lines of
//! comma-separated items. Two item flavors exist:
//!
//! - colon items (`name:value` or a bare `name`), used by pipeline-declared
//!   tags and per-job-pattern tag specs;
//! - var-list items (`name=value` after environment expansion), used by tag
//!   files and the job tag-properties string.
//!
//! Malformed or empty items never raise: they are dropped with a diagnostic.

use std::collections::HashMap;

use super::TagSet;

/// Splits a newline-separated configuration string into trimmed, non-empty
/// lines.
pub(crate) fn split_lines(input: &str) -> Vec<&str> {
    split_on(input, &['\n', '\r'])
}

/// Splits one configuration line into trimmed, non-empty comma-separated
/// items.
pub(crate) fn split_csv(input: &str) -> Vec<&str> {
    split_on(input, &[','])
}

fn split_on<'a>(input: &'a str, separators: &[char]) -> Vec<&'a str> {
    input
        .trim()
        .split(separators)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Expands `$NAME` and `${NAME}` references against an environment snapshot.
///
/// Unresolved references are left verbatim, so a later literal `$1` can still
/// be treated as a capture-group reference by the per-job-pattern stage.
pub(crate) fn expand_env(template: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;
    while pos < template.len() {
        let rest = &template[pos..];
        let Some(dollar) = rest.find('$') else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..dollar]);
        pos += dollar;

        let after = &template[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        match env.get(name) {
            Some(value) if !name.is_empty() => {
                out.push_str(value);
                pos += 1 + consumed;
            }
            _ => {
                out.push('$');
                pos += 1;
            }
        }
    }
    out
}

/// Parses one colon item (`name:value` or bare `name`) into `out`.
///
/// Spaces are stripped from the whole item first. Items that are empty after
/// stripping are dropped with a diagnostic.
pub(crate) fn parse_colon_item(item: &str, out: &mut TagSet) {
    let item = item.replace(' ', "");
    if item.is_empty() {
        tracing::debug!("ignoring empty tag item");
        return;
    }
    match item.split_once(':') {
        Some((name, value)) => {
            if name.is_empty() {
                tracing::debug!(%item, "ignoring tag item with empty name");
            } else {
                out.insert(name, value);
            }
        }
        None => out.insert_bare(item),
    }
}

/// Parses a var-list configuration string (tag file contents or the job
/// tag-properties string) into `out`.
///
/// Each comma-separated item of each line is environment-expanded as a whole,
/// then split on the first `=`. An item with no `=` contributes a bare tag
/// name.
pub(crate) fn parse_var_list(list: &str, env: &HashMap<String, String>, out: &mut TagSet) {
    for line in split_lines(list) {
        for item in split_csv(line) {
            let expanded = expand_env(&item.replace(' ', ""), env);
            match expanded.split_once('=') {
                Some((name, value)) => {
                    if name.is_empty() {
                        tracing::debug!(%item, "ignoring tag item with empty name");
                    } else {
                        out.insert(name, value);
                    }
                }
                None if expanded.is_empty() => {
                    tracing::debug!(%item, "ignoring empty tag item");
                }
                None => out.insert_bare(expanded),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn split_lines_trims_and_drops_empties() {
        assert_eq!(split_lines(" a \r\n\n b \n"), vec!["a", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(split_csv("a, b ,,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn expand_replaces_known_vars() {
        let env = env(&[("BRANCH", "main")]);
        assert_eq!(expand_env("branch=$BRANCH", &env), "branch=main");
        assert_eq!(expand_env("branch=${BRANCH}x", &env), "branch=mainx");
    }

    #[test]
    fn expand_leaves_unknown_vars_verbatim() {
        let env = env(&[]);
        assert_eq!(expand_env("owner:$1", &env), "owner:$1");
        assert_eq!(expand_env("x=$MISSING", &env), "x=$MISSING");
    }

    #[test]
    fn colon_item_with_value() {
        let mut tags = TagSet::new();
        parse_colon_item("team: Platform", &mut tags);
        assert!(tags.values("team").unwrap().contains("platform"));
    }

    #[test]
    fn colon_item_bare_name() {
        let mut tags = TagSet::new();
        parse_colon_item("canary", &mut tags);
        assert!(tags.values("canary").unwrap().contains(""));
    }

    #[test]
    fn colon_item_empty_is_dropped() {
        let mut tags = TagSet::new();
        parse_colon_item("  ", &mut tags);
        parse_colon_item(":value", &mut tags);
        assert!(tags.is_empty());
    }

    #[test]
    fn var_list_expands_then_splits_on_equals() {
        let mut tags = TagSet::new();
        let env = env(&[("STAGE", "prod")]);
        parse_var_list("env=$STAGE, flaky\nowner=ci", &env, &mut tags);
        assert!(tags.values("env").unwrap().contains("prod"));
        assert!(tags.values("flaky").unwrap().contains(""));
        assert!(tags.values("owner").unwrap().contains("ci"));
    }

    #[test]
    fn var_list_value_may_contain_equals() {
        let mut tags = TagSet::new();
        parse_var_list("expr=a=b", &env(&[]), &mut tags);
        assert!(tags.values("expr").unwrap().contains("a=b"));
    }
}
