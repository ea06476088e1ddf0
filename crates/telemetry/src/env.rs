const BLOBI_LOG: &str = "BLOBI_LOG";
const RUST_LOG: &str = "RUST_LOG";
const BLOBI_LOG_FORMAT: &str = "BLOBI_LOG_FORMAT";
const NO_COLOR: &str = "NO_COLOR";

/// Filter used when neither `BLOBI_LOG` nor `RUST_LOG` is set.
pub(crate) const DEFAULT_FILTER: &str = "warn,blobi=info";

/// How log lines are written to stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Returns the filter directives for the log layer.
///
/// `BLOBI_LOG` takes precedence over `RUST_LOG`. Empty values count as unset.
pub(crate) fn filter_directives(lookup: impl Fn(&str) -> Option<String>) -> String {
    [BLOBI_LOG, RUST_LOG]
        .into_iter()
        .find_map(|key| lookup(key).filter(|val| !val.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

/// Returns the log format selected by `BLOBI_LOG_FORMAT`.
///
/// Anything other than `json` (case-insensitive) selects plain text.
pub(crate) fn log_format(lookup: impl Fn(&str) -> Option<String>) -> LogFormat {
    match lookup(BLOBI_LOG_FORMAT) {
        Some(val) if val.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// Returns a boolean indicating if colored output should be disabled.
///
/// It is considered disabled if the environment variable `NO_COLOR` is set and not empty.
pub(crate) fn ansi_disabled() -> bool {
    any_vars_set(&[NO_COLOR])
}

fn any_vars_set(enabling_vars: &[&str]) -> bool {
    enabling_vars
        .iter()
        .any(|key| std::env::var_os(key).is_some_and(|val| !val.is_empty()))
}
