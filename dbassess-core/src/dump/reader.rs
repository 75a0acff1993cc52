//! Dump decoding.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{DumpTable, Row};

/// Where the reader currently sits in the document.
enum State {
    Outside,
    InTable(DumpTable),
    InRow(DumpTable, Row),
    InField(DumpTable, Row, String, String),
}

/// Decodes a dump document into its tables.
///
/// Only `table_data` sections contribute rows; `table_structure` and the
/// enclosing `mysqldump`/`database` elements are skipped. An empty field
/// element yields `""`. Field text is taken verbatim, including
/// surrounding whitespace.
///
/// Malformed input (invalid UTF-8, mismatched or unclosed tags, bad entity
/// references, a `row` outside `table_data`) decodes to an empty list.
///
/// # Example
/// ```rust
/// use dbassess_core::dump::decode;
///
/// let doc = br#"<mysqldump><database name="TURBINE">
/// <table_data name="GROUP_TYPE"><row><field name="GROUP_TYPE_ID">3</field><field name="TUPLE_FLAG"/></row></table_data>
/// </database></mysqldump>"#;
/// let tables = decode(doc);
/// assert_eq!(tables[0].rows[0].get("group_type_id"), Some("3"));
/// assert_eq!(tables[0].rows[0].get("TUPLE_FLAG"), Some(""));
/// assert!(decode(b"<mysqldump><row>").is_empty());
/// ```
pub fn decode(bytes: &[u8]) -> Vec<DumpTable> {
    match try_decode(bytes) {
        Some(tables) => tables,
        None => {
            tracing::debug!(len = bytes.len(), "Discarding malformed dump document");
            Vec::new()
        }
    }
}

fn try_decode(bytes: &[u8]) -> Option<Vec<DumpTable>> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = true;

    let mut tables = Vec::new();
    let mut state = State::Outside;

    loop {
        let event = reader.read_event().ok()?;
        state = match (state, event) {
            (State::Outside, Event::Start(e)) if is(&e, b"table_data") => {
                State::InTable(DumpTable::new(name_attr(&e, "name")?, Vec::new()))
            }
            (State::Outside, Event::Empty(e)) if is(&e, b"table_data") => {
                tables.push(DumpTable::new(name_attr(&e, "name")?, Vec::new()));
                State::Outside
            }
            (State::Outside, Event::Start(e) | Event::Empty(e)) if is(&e, b"row") => {
                return None;
            }
            (State::Outside, Event::Eof) => break,
            (state @ State::Outside, _) => state,

            (State::InTable(table), Event::Start(e)) if is(&e, b"row") => {
                State::InRow(table, Row::new())
            }
            (State::InTable(mut table), Event::Empty(e)) if is(&e, b"row") => {
                table.rows.push(Row::new());
                State::InTable(table)
            }
            (State::InTable(table), Event::End(e)) if e.name().as_ref() == b"table_data" => {
                tables.push(table);
                State::Outside
            }
            (State::InTable(table), Event::Text(_) | Event::Comment(_)) => {
                State::InTable(table)
            }
            (State::InTable(_), _) => return None,

            (State::InRow(table, row), Event::Start(e)) if is(&e, b"field") => {
                let name = name_attr(&e, "name")?;
                State::InField(table, row, name, String::new())
            }
            (State::InRow(table, mut row), Event::Empty(e)) if is(&e, b"field") => {
                row.push(name_attr(&e, "name")?, String::new());
                State::InRow(table, row)
            }
            (State::InRow(mut table, row), Event::End(e)) if e.name().as_ref() == b"row" => {
                table.rows.push(row);
                State::InTable(table)
            }
            (State::InRow(table, row), Event::Text(_) | Event::Comment(_)) => {
                State::InRow(table, row)
            }
            (State::InRow(..), _) => return None,

            (State::InField(table, row, name, mut value), Event::Text(t)) => {
                value.push_str(&t.unescape().ok()?);
                State::InField(table, row, name, value)
            }
            (State::InField(table, row, name, mut value), Event::CData(c)) => {
                value.push_str(std::str::from_utf8(&c).ok()?);
                State::InField(table, row, name, value)
            }
            (State::InField(table, mut row, name, value), Event::End(e))
                if e.name().as_ref() == b"field" =>
            {
                row.push(name, value);
                State::InRow(table, row)
            }
            (State::InField(..), _) => return None,
        };
    }

    Some(tables)
}

fn is(element: &BytesStart<'_>, tag: &[u8]) -> bool {
    element.name().as_ref() == tag
}

fn name_attr(element: &BytesStart<'_>, key: &str) -> Option<String> {
    let attr = element.try_get_attribute(key).ok()??;
    Some(attr.unescape_value().ok()?.into_owned())
}
