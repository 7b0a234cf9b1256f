//! JSON output for the CLI
//!
//! - Output: one JSON object per command on stdout
//! - UTF-8 only

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

fn write_line<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn success(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

fn failure(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &success(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&mut io::stdout(), &failure(code, message))
}
