//! Defensive JSON field access and the output escaping rules.
//!
//! Request bodies are parsed into a generic [`Value`] and read through the
//! accessors below. A field that is absent or has the wrong type yields the
//! caller's default instead of an error, so a malformed optional field never
//! aborts a request.
//!
//! All JSON the gateway writes goes through [`to_vec`], which serializes with
//! [`EscapingFormatter`]: `"` and `\` are backslash-escaped, newline,
//! carriage return and tab use their short escapes, and every other byte
//! below `0x20` becomes `\u00XX`. All other bytes pass through unchanged.

use std::io;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{CharEscape, Formatter, Serializer};

/// Read a string field.
pub fn get_string<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Read a boolean field, falling back to `default`.
pub fn get_bool(obj: &Value, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Read an integer field, falling back to `default`.
///
/// Floating point values are not coerced.
pub fn get_int(obj: &Value, key: &str, default: i64) -> i64 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(default)
}

/// Read an array field.
pub fn get_array<'a>(obj: &'a Value, key: &str) -> Option<&'a [Value]> {
    obj.get(key).and_then(Value::as_array).map(Vec::as_slice)
}

/// Read a nested object field.
pub fn get_object<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| v.is_object())
}

/// `serde_json` formatter that applies the gateway's escaping rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapingFormatter;

impl Formatter for EscapingFormatter {
    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let escaped: &[u8] = match char_escape {
            CharEscape::Quote => b"\\\"",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::Solidus => b"/",
            CharEscape::LineFeed => b"\\n",
            CharEscape::CarriageReturn => b"\\r",
            CharEscape::Tab => b"\\t",
            CharEscape::Backspace => return write_control_escape(writer, 0x08),
            CharEscape::FormFeed => return write_control_escape(writer, 0x0c),
            CharEscape::AsciiControl(byte) => return write_control_escape(writer, byte),
        };
        writer.write_all(escaped)
    }
}

fn write_control_escape<W>(writer: &mut W, byte: u8) -> io::Result<()>
where
    W: ?Sized + io::Write,
{
    const HEX: &[u8; 16] = b"0123456789abcdef";
    writer.write_all(&[
        b'\\',
        b'u',
        b'0',
        b'0',
        HEX[usize::from(byte >> 4)],
        HEX[usize::from(byte & 0x0f)],
    ])
}

/// Serialize `value` as compact JSON using [`EscapingFormatter`].
pub fn to_vec<T>(value: &T) -> serde_json::Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    let mut out = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut out, EscapingFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Escape `text` for embedding between double quotes in JSON output.
pub fn escape(text: &str) -> String {
    let mut quoted = Vec::with_capacity(text.len() + 2);
    let mut serializer = Serializer::with_formatter(&mut quoted, EscapingFormatter);
    // Writing a str into a Vec cannot fail.
    if text.serialize(&mut serializer).is_err() {
        return String::new();
    }
    let inner = &quoted[1..quoted.len() - 1];
    String::from_utf8_lossy(inner).into_owned()
}
