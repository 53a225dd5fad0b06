//! Data export.

pub mod csv;

pub use self::csv::{
    call_history_csv, escape_field, spreadsheet_safe, write_call_history, CALL_HISTORY_HEADERS,
};
