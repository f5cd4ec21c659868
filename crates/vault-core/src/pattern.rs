//! Entry key patterns shared by extraction and removal

use std::fmt;
use std::path::{Path, PathBuf};

/// Pattern that selects every entry
pub const WILDCARD: &str = "*";

/// Selects entries by exact key or by virtual-directory prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    All,
    /// Matches `k` when `k == p` or `k` starts with `p + "/"`
    Path(String),
}

impl KeyPattern {
    /// Parse user input; a trailing `/` is ignored
    pub fn parse(raw: &str) -> Self {
        if raw == WILDCARD {
            return KeyPattern::All;
        }
        KeyPattern::Path(raw.trim_end_matches('/').to_string())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::All => true,
            KeyPattern::Path(p) => {
                !p.is_empty()
                    && key
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
        }
    }

    /// Keys from `keys` that match, in input order
    pub fn select<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        keys.into_iter()
            .filter(|k| self.matches(k))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::All => f.write_str(WILDCARD),
            KeyPattern::Path(p) => f.write_str(p),
        }
    }
}

/// Where an entry lands under `out_dir`
///
/// Returns `None` for keys that would escape `out_dir`: absolute keys, empty
/// segments, `.` or `..`.
pub fn output_path(out_dir: &Path, key: &str) -> Option<PathBuf> {
    let mut target = out_dir.to_path_buf();
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        let segment_path = Path::new(segment);
        if segment_path.has_root() || segment_path.is_absolute() {
            return None;
        }
        target.push(segment);
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_prefix_matches() {
        let pattern = KeyPattern::parse("docs");
        assert!(pattern.matches("docs"));
        assert!(pattern.matches("docs/a.txt"));
        assert!(pattern.matches("docs/b/c.txt"));
        assert!(!pattern.matches("docs2/a.txt"));
        assert!(!pattern.matches("documents"));
        assert!(!pattern.matches("x/docs/a.txt"));
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        assert_eq!(KeyPattern::parse("docs/"), KeyPattern::Path("docs".into()));
        assert!(KeyPattern::parse("docs/b/").matches("docs/b/c.txt"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let pattern = KeyPattern::parse("*");
        assert_eq!(pattern, KeyPattern::All);
        assert!(pattern.matches("anything/at/all"));
        assert_eq!(pattern.to_string(), "*");
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        assert!(!KeyPattern::parse("").matches("a"));
        assert!(!KeyPattern::parse("/").matches("/a"));
    }

    #[test]
    fn test_select_keeps_order() {
        let keys = ["a/1", "b", "a/2", "ab"];
        assert_eq!(KeyPattern::parse("a").select(keys), vec!["a/1", "a/2"]);
    }

    #[test]
    fn test_output_path_stays_inside() {
        let out = Path::new("/tmp/out");
        assert_eq!(output_path(out, "docs/b/c.txt"), Some(PathBuf::from("/tmp/out/docs/b/c.txt")));
        assert_eq!(output_path(out, "../etc/passwd"), None);
        assert_eq!(output_path(out, "docs/../../x"), None);
        assert_eq!(output_path(out, "/etc/passwd"), None);
        assert_eq!(output_path(out, "a//b"), None);
        assert_eq!(output_path(out, ""), None);
    }
}
