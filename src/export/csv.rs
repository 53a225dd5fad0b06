//! Call-history CSV export.

use std::io::Write;

use ::csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::api::types::Call;
use crate::http::types::{ApiError, ApiResult};

/// Column order of the call-history export.
pub const CALL_HISTORY_HEADERS: [&str; 11] = [
    "Call ID",
    "Date",
    "Time",
    "Lead Name",
    "Phone Number",
    "Direction",
    "Status",
    "Duration (s)",
    "Outcome",
    "Sentiment",
    "Summary",
];

const MIN_PHONE_DIGITS: usize = 7;

/// Quote `value` per RFC 4180 when it contains a delimiter, quote or line break.
pub fn escape_field(value: &str) -> ApiResult<String> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record([value]).map_err(export_error)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Export(e.to_string()))?;
    let mut field = String::from_utf8(bytes).map_err(|e| ApiError::Export(e.to_string()))?;
    if field.ends_with('\n') {
        field.pop();
    }
    Ok(field)
}

/// Guard a value against spreadsheet reinterpretation.
///
/// Phone numbers become `="..."` text formulas so a leading `+` or zero
/// survives; anything else that a spreadsheet would evaluate gets a `'` prefix.
pub fn spreadsheet_safe(value: &str) -> String {
    if looks_like_phone(value) {
        return format!("=\"{value}\"");
    }
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{value}"),
        _ => value.to_string(),
    }
}

fn looks_like_phone(value: &str) -> bool {
    let rest = value.strip_prefix('+').unwrap_or(value);
    let mut digits = 0;
    for c in rest.chars() {
        match c {
            '0'..='9' => digits += 1,
            '-' | '(' | ')' | ' ' | '.' => {}
            _ => return false,
        }
    }
    digits >= MIN_PHONE_DIGITS
}

/// One export row. Server-provided text is guarded; formatted columns are not.
fn call_row(call: &Call) -> [String; 11] {
    let text = |value: Option<&str>| spreadsheet_safe(value.unwrap_or_default());
    [
        text(Some(call.id.as_str())),
        call.created_at.format("%Y-%m-%d").to_string(),
        call.created_at.format("%H:%M:%S").to_string(),
        text(call.lead_name.as_deref()),
        text(Some(call.phone_number.as_str())),
        call.direction.as_str().to_string(),
        text(Some(call.status.as_str())),
        call.duration_seconds.map(|d| d.to_string()).unwrap_or_default(),
        text(call.outcome.as_deref()),
        text(call.sentiment.as_deref()),
        text(call.summary.as_deref()),
    ]
}

/// Write `calls` as CSV with the fixed header row.
pub fn write_call_history<W: Write>(calls: &[Call], writer: W) -> ApiResult<()> {
    let mut out = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(writer);

    out.write_record(CALL_HISTORY_HEADERS).map_err(export_error)?;
    for call in calls {
        out.write_record(call_row(call)).map_err(export_error)?;
    }
    out.flush().map_err(|e| ApiError::Export(e.to_string()))?;
    tracing::debug!(rows = calls.len(), "Call history exported");
    Ok(())
}

/// Render `calls` to an in-memory CSV string.
pub fn call_history_csv(calls: &[Call]) -> ApiResult<String> {
    let mut buffer = Vec::new();
    write_call_history(calls, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ApiError::Export(e.to_string()))
}

fn export_error(err: ::csv::Error) -> ApiError {
    ApiError::Export(err.to_string())
}
