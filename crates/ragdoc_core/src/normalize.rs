use crate::error::{AppError, EMPTY_INPUT};

/// Clean raw extracted text while preserving paragraph and sentence
/// structure.
///
/// - CRLF/CR line endings become LF.
/// - Runs of horizontal whitespace collapse to a single space.
/// - Runs of 3+ newlines collapse to exactly 2 (paragraph break).
/// - Control characters other than newline are dropped.
/// - Single newlines inside a paragraph are kept as-is.
///
/// Fails with `EMPTY_INPUT` when the cleaned result has no
/// non-whitespace characters; callers skip such documents instead of
/// indexing them.
pub fn normalize(raw: &str) -> Result<String, AppError> {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut pending_space = false;
    let mut newline_run = 0usize;

    for ch in unified.chars() {
        if ch == '\n' {
            newline_run += 1;
            pending_space = false;
            continue;
        }
        let horizontal_ws = ch != '\n' && ch.is_whitespace();
        if newline_run > 0 {
            if !out.is_empty() {
                out.push_str(if newline_run >= 2 { "\n\n" } else { "\n" });
            }
            newline_run = 0;
        }
        if horizontal_ws {
            pending_space = true;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if pending_space {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(ch);
    }

    let cleaned = out.trim_end();
    if cleaned.is_empty() {
        return Err(AppError::new(
            EMPTY_INPUT,
            "Document text is empty after normalization",
        ));
    }
    Ok(cleaned.to_string())
}
