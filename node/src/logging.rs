//! # CLI Diagnostics
//!
//! Tracing setup tuned for a short-lived, single-command process. Two
//! rules drive everything here:
//!
//! - stdout belongs to the JSON command result, so every diagnostic line
//!   goes to stderr;
//! - by default only this workspace's crates log, and sled is pinned to
//!   `warn` because its background flush chatter would otherwise dwarf
//!   the output of a command that runs for milliseconds.
//!
//! `RUST_LOG`, when set, replaces the store filter wholesale.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format, selected by `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable stderr lines, stripped of timestamps and targets;
    /// a one-shot CLI has no timeline worth printing.
    Pretty,
    /// JSON lines with full metadata, for piping into log tooling.
    Json,
}

impl LogFormat {
    /// Parse a format string; anything that is not "json" means pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// The default filter: `level` scoped to the blocktree crates, sled
/// quieted to warnings.
fn store_filter(level: &str) -> String {
    format!("blocktree={level},blocktree_node={level},sled=warn")
}

/// Install the global subscriber for this invocation.
///
/// `level` feeds [`store_filter`] unless `RUST_LOG` is set, in which case
/// the environment wins with the usual `EnvFilter` directive syntax.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(store_filter(level)));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .without_time()
                    .with_target(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lossy() {
        assert_eq!(LogFormat::from_str_lossy("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("whatever"), LogFormat::Pretty);
    }

    #[test]
    fn store_filter_scopes_the_level() {
        let filter = store_filter("debug");
        assert_eq!(filter, "blocktree=debug,blocktree_node=debug,sled=warn");
    }
}
