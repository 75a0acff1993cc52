//! Tests for the dump reader and writer.

use super::*;
use proptest::prelude::*;

const DRIVER_DOC: &str = r#"<?xml version="1.0"?>
<mysqldump xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<database name="TURBINE">
	<table_structure name="DB_DRIVER">
		<field Field="DB_DRIVER_ID" Type="int(11)" Null="NO" Key="PRI" Extra="" />
		<field Field="URL_TEMPLATE" Type="varchar(255)" Null="YES" Key="" Extra="" />
	</table_structure>
	<table_data name="DB_DRIVER">
	<row>
		<field name="DB_DRIVER_ID">1</field>
		<field name="NAME">Oracle (DataDirect)</field>
		<field name="URL_TEMPLATE">jdbc:guardium:oracle://&lt;HOST&gt;:&lt;PORT&gt;;ServiceName=&lt;SERVICE_NAME&gt;</field>
		<field name="DRIVER_STORED"></field>
	</row>
	<row>
		<field name="DB_DRIVER_ID">2</field>
		<field name="NAME">MySQL</field>
		<field name="URL_TEMPLATE" />
		<field name="DRIVER_STORED">0</field>
	</row>
	</table_data>
</database>
</mysqldump>
"#;

#[test]
fn test_decode_driver_document() {
    let tables = decode(DRIVER_DOC.as_bytes());
    assert_eq!(tables.len(), 1);

    let table = &tables[0];
    assert_eq!(table.name, "DB_DRIVER");
    assert_eq!(table.rows.len(), 2);
    assert_eq!(
        table.rows[0].get("url_template"),
        Some("jdbc:guardium:oracle://<HOST>:<PORT>;ServiceName=<SERVICE_NAME>")
    );
    assert_eq!(table.rows[0].get("DRIVER_STORED"), Some(""));
    assert_eq!(table.rows[1].get("URL_TEMPLATE"), Some(""));
    assert_eq!(table.rows[1].get("MISSING"), None);
}

#[test]
fn test_structure_section_contributes_no_rows() {
    let doc = r#"<mysqldump><database name="TURBINE">
<table_structure name="T"><field Field="A" /></table_structure>
</database></mysqldump>"#;
    assert!(decode(doc.as_bytes()).is_empty());
}

#[test]
fn test_values_are_not_trimmed() {
    let doc = "<mysqldump><table_data name=\"T\"><row><field name=\"a\">  padded \n</field></row></table_data></mysqldump>";
    let tables = decode(doc.as_bytes());
    assert_eq!(tables[0].rows[0].get("a"), Some("  padded \n"));
}

#[test]
fn test_malformed_input_decodes_empty() {
    let cases: [&[u8]; 7] = [
        b"",
        b"\xff\xfe not utf8",
        b"<mysqldump><table_data name=\"T\"><row><field name=\"a\">x</row></table_data></mysqldump>",
        b"<mysqldump><table_data name=\"T\"><row><field name=\"a\">x</field>",
        b"<mysqldump><row><field name=\"a\">x</field></row></mysqldump>",
        b"<mysqldump><table_data name=\"T\"><row><field name=\"a\">&bogus;</field></row></table_data></mysqldump>",
        b"<mysqldump><table_data><row></row></table_data></mysqldump>",
    ];
    for case in cases {
        assert!(
            decode(case).is_empty(),
            "expected empty decode for {:?}",
            String::from_utf8_lossy(case)
        );
    }
}

#[test]
fn test_empty_table_and_empty_row() {
    let doc = r#"<mysqldump>
<table_data name="A"></table_data>
<table_data name="B"/>
<table_data name="C"><row/></table_data>
</mysqldump>"#;
    let tables = decode(doc.as_bytes());
    assert_eq!(tables.len(), 3);
    assert!(tables[0].rows.is_empty());
    assert!(tables[1].rows.is_empty());
    assert_eq!(tables[2].rows, vec![Row::new()]);
}

#[test]
fn test_uniform_escaping_round_trips_markup() {
    let table = DumpTable::new(
        "GROUP_MEMBER",
        vec![
            Row::new()
                .with("GROUP_ID", "12")
                .with("GROUP_MEMBER", "<sys> & \"dba\" 'x'"),
            Row::new().with("GROUP_ID", "13").with("GROUP_MEMBER", ""),
        ],
    );
    let doc = encode_table(&table.name, &table.rows, EscapePolicy::Uniform);
    assert!(doc.contains("&lt;sys&gt; &amp; &quot;dba&quot; &apos;x&apos;"));
    assert_eq!(decode(doc.as_bytes()), vec![table]);
}

#[test]
fn test_legacy_escaping_only_touches_url_fields() {
    const URL_FIELDS: &[&str] = &["URL_TEMPLATE", "BASE_URL_TEMPLATE"];
    let rows = vec![
        Row::new()
            .with("NAME", "a<b")
            .with("url_template", "jdbc:x://<HOST>:<PORT>"),
    ];
    let doc = encode_table(
        "DB_DRIVER",
        &rows,
        EscapePolicy::Legacy {
            url_fields: URL_FIELDS,
        },
    );
    assert!(doc.contains("<field name=\"NAME\">a<b</field>"));
    assert!(doc.contains("<field name=\"url_template\">jdbc:x://&lt;HOST&gt;:&lt;PORT&gt;</field>"));
}

#[test]
fn test_document_layout() {
    let rows = vec![Row::new().with("DATASOURCE_ID", "20001").with("NAME", "orders")];
    let doc = encode_table("DATASOURCE", &rows, EscapePolicy::default());

    assert!(doc.starts_with("<?xml version=\"1.0\"?>\n<mysqldump"));
    assert!(doc.contains("<database name=\"TURBINE\">"));
    assert!(doc.contains("\t\t<field Field=\"DATASOURCE_ID\" />\n"));
    assert!(doc.contains("\t<table_data name=\"DATASOURCE\">\n\t<row>\n"));
    assert!(doc.ends_with("</database>\n</mysqldump>\n"));
}

#[test]
fn test_rows_of_prefers_named_table() {
    let tables = vec![
        DumpTable::new("OTHER", vec![Row::new().with("a", "1")]),
        DumpTable::new("avail_test", vec![Row::new().with("a", "2")]),
    ];
    let rows = rows_of(tables.clone(), "AVAIL_TEST");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("a"), Some("2"));

    let all = rows_of(tables, "MISSING");
    assert_eq!(all.len(), 2);
}

#[test]
fn test_row_accessors() {
    let row = Row::new()
        .with("PORT", " 1521 ")
        .with("SHARED", "Y")
        .with("BLANK", "   ")
        .with("BAD", "x");
    assert_eq!(row.int("port"), Some(1521));
    assert_eq!(row.int("bad"), None);
    assert_eq!(row.int_or("missing", 7), 7);
    assert!(row.flag("shared"));
    assert!(!row.flag("bad"));
    assert_eq!(row.optional("blank"), None);
    assert_eq!(row.text("missing"), "");
}

fn arb_row() -> impl Strategy<Value = Row> {
    prop::collection::vec(("[a-z_]{1,10}", "[ -~\u{a0}-\u{ff}\t\n]{0,24}"), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

fn arb_table() -> impl Strategy<Value = DumpTable> {
    ("[A-Z_]{1,12}", prop::collection::vec(arb_row(), 0..5))
        .prop_map(|(name, rows)| DumpTable::new(name, rows))
}

proptest! {
    #[test]
    fn prop_uniform_encoding_round_trips(tables in prop::collection::vec(arb_table(), 0..4)) {
        let doc = encode(&tables, EscapePolicy::Uniform);
        prop_assert_eq!(decode(doc.as_bytes()), tables);
    }
}
