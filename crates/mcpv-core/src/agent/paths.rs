//! `~` and environment variable expansion for registry paths.

use std::path::PathBuf;

use crate::context::AppContext;

/// Expand `~`, `$VAR`, `${VAR}` and `%VAR%`; relative results are anchored
/// at the project root. Unset variables are left as written.
pub fn expand_path(raw: &str, ctx: &AppContext) -> PathBuf {
    expand_with(raw, ctx, |name| std::env::var(name).ok())
}

pub(crate) fn expand_with(
    raw: &str,
    ctx: &AppContext,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    let expanded = expand_vars(raw, &lookup);

    let path = if expanded == "~" {
        ctx.home_dir().to_path_buf()
    } else if let Some(rest) = expanded
        .strip_prefix("~/")
        .or_else(|| expanded.strip_prefix("~\\"))
    {
        ctx.home_dir().join(rest)
    } else {
        PathBuf::from(expanded)
    };

    if path.is_relative() {
        ctx.project_root().join(path)
    } else {
        path
    }
}

fn expand_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find(['$', '%']) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let Some((name, consumed)) = parse_var(tail) else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
            continue;
        };
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&tail[..consumed]),
        }
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    out
}

/// Variable name and the number of bytes its reference spans.
fn parse_var(tail: &str) -> Option<(&str, usize)> {
    let (name, consumed) = if let Some(body) = tail.strip_prefix("${") {
        let end = body.find('}')?;
        (&body[..end], end + 3)
    } else if let Some(body) = tail.strip_prefix('%') {
        let end = body.find('%')?;
        (&body[..end], end + 2)
    } else {
        let body = tail.strip_prefix('$')?;
        let end = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
        (&body[..end], end + 1)
    };

    let valid = !name.is_empty() && name.chars().all(is_name_char);
    valid.then_some((name, consumed))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
