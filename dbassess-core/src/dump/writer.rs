//! Dump encoding.

use std::fmt::Write as _;

use super::{DumpTable, Row};

const HEADER: &str = "<?xml version=\"1.0\"?>\n\
<mysqldump xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n\
<database name=\"TURBINE\">\n";
const FOOTER: &str = "</database>\n</mysqldump>\n";

/// How field values are escaped on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapePolicy {
    /// Escape `&`, `<`, `>`, `"` and `'` in every value.
    ///
    /// Anything written this way decodes back to the same rows.
    #[default]
    Uniform,
    /// Replace only `<` and `>`, and only inside the listed fields
    /// (matched without regard to case). Every other value is written raw.
    ///
    /// Matches the files produced by older releases byte for byte. Values
    /// containing `&` or markup outside the listed fields will not decode.
    Legacy {
        /// Fields known to carry URL templates
        url_fields: &'static [&'static str],
    },
}

impl EscapePolicy {
    fn escape<'v>(&self, field: &str, value: &'v str) -> std::borrow::Cow<'v, str> {
        match self {
            Self::Uniform => escape_all(value),
            Self::Legacy { url_fields } => {
                if url_fields.iter().any(|f| f.eq_ignore_ascii_case(field))
                    && value.contains(['<', '>'])
                {
                    value.replace('<', "&lt;").replace('>', "&gt;").into()
                } else {
                    value.into()
                }
            }
        }
    }
}

fn escape_all(value: &str) -> std::borrow::Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return value.into();
    }
    let mut out = String::with_capacity(value.len().saturating_add(16));
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out.into()
}

/// Encodes a complete document holding every table in order.
///
/// # Example
/// ```rust
/// use dbassess_core::dump::{DumpTable, EscapePolicy, Row, decode, encode};
///
/// let table = DumpTable::new(
///     "GROUP_MEMBER",
///     vec![Row::new().with("GROUP_ID", "7").with("GROUP_MEMBER", "a<b & c")],
/// );
/// let doc = encode(std::slice::from_ref(&table), EscapePolicy::Uniform);
/// assert_eq!(decode(doc.as_bytes()), vec![table]);
/// ```
pub fn encode(tables: &[DumpTable], policy: EscapePolicy) -> String {
    let mut out = String::from(HEADER);
    for table in tables {
        write_table(&mut out, &table.name, &table.rows, policy);
    }
    out.push_str(FOOTER);
    out
}

/// Encodes a document holding a single table.
pub fn encode_table(name: &str, rows: &[Row], policy: EscapePolicy) -> String {
    let mut out = String::from(HEADER);
    write_table(&mut out, name, rows, policy);
    out.push_str(FOOTER);
    out
}

fn write_table(out: &mut String, name: &str, rows: &[Row], policy: EscapePolicy) {
    let name = escape_all(name);

    // Writing into a String cannot fail.
    let _ = writeln!(out, "\t<table_structure name=\"{}\">", name);
    for column in columns(rows) {
        let _ = writeln!(out, "\t\t<field Field=\"{}\" />", escape_all(column));
    }
    out.push_str("\t</table_structure>\n");

    let _ = writeln!(out, "\t<table_data name=\"{}\">", name);
    for row in rows {
        out.push_str("\t<row>\n");
        for (field, value) in row.fields() {
            let _ = writeln!(
                out,
                "\t\t<field name=\"{}\">{}</field>",
                escape_all(field),
                policy.escape(field, value)
            );
        }
        out.push_str("\t</row>\n");
    }
    out.push_str("\t</table_data>\n");
}

/// Union of field names across rows, first-seen order.
fn columns(rows: &[Row]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for (field, _) in rows.iter().flat_map(Row::fields) {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(field)) {
            seen.push(field);
        }
    }
    seen
}
