//! Diagnostic extraction — reduces a LaTeX log to a short, user-facing summary.
//!
//! A failed run can produce thousands of log lines. The editor only needs the
//! handful that say what went wrong: TeX error lines start with `!`, and
//! package/class errors contain `Error` (e.g. `LaTeX Error: ...`).

use std::path::Path;

use tracing::debug;

/// Returned whenever the log is missing, unreadable, or has no error lines.
pub const GENERIC_FAILURE: &str = "compilation failed";
/// At most this many matching log lines are shown.
pub const MAX_SUMMARY_LINES: usize = 5;

/// Keeps the first `MAX_SUMMARY_LINES` error lines of `log`, joined by `\n`.
pub fn extract_summary(log: &str) -> String {
    let lines: Vec<&str> = log
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| is_error_line(line))
        .take(MAX_SUMMARY_LINES)
        .collect();

    if lines.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        lines.join("\n")
    }
}

/// Reads the log at `path` and summarizes it. Never fails: an absent or
/// unreadable log yields `GENERIC_FAILURE`.
pub async fn summarize_log_file(path: &Path) -> String {
    match tokio::fs::read(path).await {
        // TeX logs are not guaranteed to be UTF-8 (input encodings, 8-bit fonts).
        Ok(bytes) => extract_summary(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            debug!("No readable compile log at {path:?}: {e}");
            GENERIC_FAILURE.to_string()
        }
    }
}

fn is_error_line(line: &str) -> bool {
    line.starts_with('!') || line.contains("Error")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN_DOCUMENT_LOG: &str = "\
This is pdfTeX, Version 3.141592653-2.6-1.40.25 (TeX Live 2023) (preloaded format=pdflatex)
entering extended mode
(./document.tex
LaTeX2e <2022-11-01> patch level 1
(/usr/share/texlive/texmf-dist/tex/latex/base/article.cls
Document Class: article 2022/07/02 v1.4n Standard LaTeX document class
)
! Emergency stop.
<*> document.tex

*** (job aborted, no legal \\end found)

!  ==> Fatal error occurred, no output PDF file produced!
";

    #[test]
    fn test_keeps_bang_lines() {
        let summary = extract_summary(BROKEN_DOCUMENT_LOG);
        assert_eq!(
            summary,
            "! Emergency stop.\n!  ==> Fatal error occurred, no output PDF file produced!"
        );
    }

    #[test]
    fn test_keeps_package_error_lines() {
        let log = "(./document.tex\n\
                   ! LaTeX Error: File `missing.sty' not found.\n\
                   Type X to quit or <RETURN> to proceed,\n\
                   Package hyperref Error: Wrong DVI mode driver option.\n";
        let summary = extract_summary(log);
        assert!(summary.contains("File `missing.sty' not found."));
        assert!(summary.contains("Package hyperref Error"));
        assert!(!summary.contains("Type X to quit"));
    }

    #[test]
    fn test_caps_at_five_lines() {
        let log: String = (1..=12)
            .map(|i| format!("! Undefined control sequence number {i}.\nl.{i} \\foo\n"))
            .collect();
        let summary = extract_summary(&log);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), MAX_SUMMARY_LINES);
        assert_eq!(lines[0], "! Undefined control sequence number 1.");
        assert_eq!(lines[4], "! Undefined control sequence number 5.");
    }

    #[test]
    fn test_no_error_lines_falls_back() {
        assert_eq!(
            extract_summary("Output written on document.pdf (1 page)."),
            GENERIC_FAILURE
        );
        assert_eq!(extract_summary(""), GENERIC_FAILURE);
    }

    #[test]
    fn test_lowercase_error_not_matched() {
        // Only the capitalized token marks an error line.
        assert_eq!(extract_summary("no errors here\n"), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_missing_log_file_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let summary = summarize_log_file(&dir.path().join("document.log")).await;
        assert_eq!(summary, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_non_utf8_log_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("document.log");
        let mut bytes = b"caf\xe9\n! Missing $ inserted.\n".to_vec();
        bytes.extend_from_slice(b"l.3 \xff\n");
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(summarize_log_file(&path).await, "! Missing $ inserted.");
    }
}
