//! `.env` loading.
//!
//! Lines are `KEY=VALUE`, optionally prefixed with `export`. Blank lines and
//! lines starting with `#` or `;` are skipped. Values may be wrapped in
//! matching single or double quotes. Variables already present in the process
//! environment always win.

use std::path::Path;

use anyhow::Context;

/// Parses `.env` content into key/value pairs in file order.
pub fn parse(content: &str) -> Vec<(String, String)> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return None;
    }
    let line = line
        .strip_prefix("export ")
        .or_else(|| line.strip_prefix("export\t"))
        .map(str::trim_start)
        .unwrap_or(line);

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Applies parsed pairs to the process environment, skipping keys that are
/// already set. Returns the number of variables written.
///
/// Must run while the process is still single-threaded.
fn apply(pairs: Vec<(String, String)>) -> usize {
    let mut applied = 0;
    for (key, value) in pairs {
        if std::env::var_os(&key).is_some() {
            tracing::debug!(%key, "keeping existing environment value");
            continue;
        }
        std::env::set_var(&key, value);
        applied += 1;
    }
    applied
}

/// Loads `path` if it exists. A missing file is not an error. Refuses to run
/// on an async runtime, whose worker threads may be reading the environment.
pub fn load(path: &Path) -> anyhow::Result<usize> {
    if tokio::runtime::Handle::try_current().is_ok() {
        anyhow::bail!(
            "{} must be loaded before the async runtime starts",
            path.display()
        );
    }
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(apply(parse(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_exports_and_quotes() {
        let content = "\
# database
; legacy comment
export DATABASE_URL=postgres://localhost/faculty
BIND_ADDR = \"0.0.0.0:9000\"
GREETING='hello world'
EMPTY=
NOT_A_PAIR
=orphan
URL_WITH_EQUALS=a=b
";
        let pairs = parse(content);
        assert_eq!(
            pairs,
            vec![
                ("DATABASE_URL".to_string(), "postgres://localhost/faculty".to_string()),
                ("BIND_ADDR".to_string(), "0.0.0.0:9000".to_string()),
                ("GREETING".to_string(), "hello world".to_string()),
                ("EMPTY".to_string(), String::new()),
                ("URL_WITH_EQUALS".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn mismatched_quotes_are_kept() {
        let pairs = parse("A=\"open\nB='x\"");
        assert_eq!(pairs[0].1, "\"open");
        assert_eq!(pairs[1].1, "'x\"");
    }

    #[tokio::test]
    async fn load_refuses_to_run_inside_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "FACULTY_TRACKER_TEST_LATE=from-file\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("before the async runtime starts"));
        assert!(std::env::var_os("FACULTY_TRACKER_TEST_LATE").is_none());
    }

    #[test]
    fn load_does_not_override_existing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "FACULTY_TRACKER_TEST_PRESET=from-file\nFACULTY_TRACKER_TEST_FRESH=from-file\n",
        )
        .unwrap();
        std::env::set_var("FACULTY_TRACKER_TEST_PRESET", "from-env");

        let applied = load(&path).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            std::env::var("FACULTY_TRACKER_TEST_PRESET").unwrap(),
            "from-env"
        );
        assert_eq!(
            std::env::var("FACULTY_TRACKER_TEST_FRESH").unwrap(),
            "from-file"
        );
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("absent.env")).unwrap(), 0);
    }
}
