use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn append_line(path: &Path, line: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, e))
}

/// Rewrite the whole file atomically (write to a sibling temp file, then
/// rename over the original), used only when a migration fires.
pub fn rewrite_all(path: &Path, lines: &[String]) -> Result<()> {
    let tmp = path.with_extension("jsonl.tmp");
    let body = lines.join("\n") + "\n";
    std::fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

/// Escape a cwd into a single directory-name segment, mirroring
/// `SessionManager._resolve_sessions_dir`'s `--<path-with-sep-as-dash>--`.
pub fn escape_cwd(cwd: &str) -> String {
    let trimmed = cwd.trim_start_matches(std::path::MAIN_SEPARATOR);
    let escaped = trimmed.replace(std::path::MAIN_SEPARATOR, "-").replace(':', "-");
    format!("--{escaped}--")
}

pub fn default_sessions_root() -> PathBuf {
    dirs_home().join(".corvid").join("sessions")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn resolve_sessions_dir(cwd: &str, sessions_dir: Option<&Path>) -> PathBuf {
    match sessions_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_sessions_root().join(escape_cwd(cwd)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_path_separators() {
        assert_eq!(escape_cwd("/home/user/project"), "--home-user-project--");
    }
}
