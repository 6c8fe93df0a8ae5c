//! Rendering the drained update queue into one textual payload.
//!
//! Patch records become `$("target").op("content")` instructions with
//! the content escaped for safe interpolation into the call; script
//! records pass through verbatim. Records are joined by newlines in
//! queue order — clients applying the payload top to bottom observe the
//! same end state production did.

use arbor_core::UpdateRecord;

/// Render the records, in order, into one newline-joined payload.
#[must_use]
pub fn render_page_updates(records: &[UpdateRecord]) -> String {
    records
        .iter()
        .map(|record| match record {
            UpdateRecord::Patch { op, target, content } => {
                format!("$(\"{target}\").{}(\"{}\")", op.as_str(), escape_js(content))
            }
            UpdateRecord::Script { content } => content.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape `content` for interpolation into a double-quoted JS string.
///
/// Besides the usual backslash/quote/newline escapes, `</` becomes
/// `<\/` so embedded markup cannot terminate an enclosing script block.
fn escape_js(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' if chars.peek() == Some(&'/') => {
                chars.next();
                out.push_str("<\\/");
            }
            _ => out.push(c),
        }
    }
    out
}
