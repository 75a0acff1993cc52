//! Row to record conversions for the catalog dumps.
//!
//! Rows without a parsable primary key are skipped by returning `None`.

use crate::dump::Row;
use crate::models::{
    AvailableTest, ComparisonOperator, CveFix, CveReference, DbDriver, GroupDesc, GroupMember,
    GroupType, ReturnType, Severity, SqlbasedAssessmentDefinition, StigReference, TestKind,
    Threshold,
};

fn int32(row: &Row, name: &str) -> Option<i32> {
    row.int(name).and_then(|v| i32::try_from(v).ok())
}

pub(super) fn available_test(row: &Row) -> Option<AvailableTest> {
    let id = row.int("test_id")?;
    let severity = row
        .optional("severity")
        .map_or(Severity::Info, |s| Severity::parse(&s));

    Some(AvailableTest {
        id,
        kind: TestKind::from_test_id(id),
        test_type: int32(row, "test_type").unwrap_or_default(),
        datasource_type_id: int32(row, "datasource_type_id").unwrap_or_default(),
        severity,
        category_name: row.string("category_name"),
        description: row.string("test_desc"),
        short_description: row.string("short_description"),
        report_id: row.int("report_id"),
        class_name: row.string("class_name"),
        audit_config_template_id: row.int("audit_config_template_id"),
        threshold: Threshold {
            required: row.flag("threshold_required"),
            prompt: row.optional("threshold_prompt"),
            default_value: row.optional("default_threshold_value"),
        },
        os: row.optional("os"),
        can_have_exceptions_group: row.flag("can_have_exceptions_group"),
        applicable_from_version: row.optional("applicable_from_version"),
        applicable_to_version: row.optional("applicable_to_version"),
        external_reference: row.optional("external_reference"),
        stig: StigReference {
            reference: row.optional("stig_reference"),
            severity: row.optional("stig_severity"),
            ia_controls: row.optional("stig_iacontrols"),
            srg: row.optional("stig_srg"),
        },
        timestamp: row.optional("timestamp"),
    })
}

pub(super) fn sql_definition(row: &Row) -> Option<SqlbasedAssessmentDefinition> {
    let test_id = row.int("test_id")?;
    let operator_id = int32(row, "operator_id").unwrap_or_default();

    Some(SqlbasedAssessmentDefinition {
        id: row.int_or("sqlbased_assessment_definition_id", 0),
        test_id,
        sql_stmt: row.string("sql_stmt"),
        operator_id,
        operator: ComparisonOperator::from_id(operator_id),
        compare_to_value: row.string("compare_to_value"),
        return_type: ReturnType::from_code(row.text("return_type")),
        result_text_pass: row.string("result_text_pass"),
        result_text_fail: row.string("result_text_fail"),
        recommendation_text_pass: row.string("recommendation_text_pass"),
        recommendation_text_fail: row.string("recommendation_text_fail"),
        detail_sql: row.optional("detail_sql"),
        detail_text: row.optional("detail_text"),
        pre_test_check_sql: row.optional("pre_test_check_sql"),
        pre_test_fail_message: row.optional("pre_test_fail_message"),
        is_callable_statement: row.flag("is_callable_statement"),
        loop_databases: row.flag("loop_databases"),
        db_loop_flag: row.flag("db_loop_flag"),
    })
}

pub(super) fn cve_fix(row: &Row) -> Option<CveFix> {
    Some(CveFix {
        id: row.int_or("cve_fix_id", 0),
        test_id: row.int("available_test_id")?,
        version: row.string("version"),
        patch: row.string("patch"),
        patch_to: row.string("patch_to"),
    })
}

pub(super) fn cve_reference(row: &Row) -> Option<CveReference> {
    Some(CveReference {
        id: row.int_or("cve_reference_id", 0),
        test_id: row.int("test_id")?,
        reference_type: row.string("cve_reference_type"),
        source: row.string("cve_reference_source"),
        href: row.string("cve_reference_href"),
    })
}

pub(super) fn group_desc(row: &Row) -> Option<GroupDesc> {
    Some(GroupDesc {
        id: row.int("group_id")?,
        group_type_id: row.int_or("group_type_id", 0),
        description: row.string("group_description"),
        application_id: row.int("application_id"),
        category_name: row.optional("category_name"),
        classification_name: row.optional("classification_name"),
        subtype: row.optional("group_subtype"),
        content_type: row.optional("group_content_type"),
    })
}

pub(super) fn group_member(row: &Row) -> Option<GroupMember> {
    Some(GroupMember {
        id: row.int_or("member_id", 0),
        group_id: row.int("group_id")?,
        member: row.string("group_member"),
    })
}

pub(super) fn group_type(row: &Row) -> Option<GroupType> {
    Some(GroupType {
        id: row.int("group_type_id")?,
        description: row.string("type_description"),
        allow_regex: row.flag("allow_regex"),
        tuple_flag: row.flag("tuple_flag"),
    })
}

pub(super) fn db_driver(row: &Row) -> Option<DbDriver> {
    Some(DbDriver {
        id: row.int("db_driver_id")?,
        datasource_type_id: int32(row, "datasource_type_id").unwrap_or_default(),
        name: row.string("name"),
        class_name: row.string("driver_class"),
        url_template: row.string("url_template"),
        base_url_template: row.string("base_url_template"),
        driver_stored: row.flag("driver_stored"),
        timestamp: row.optional("timestamp"),
    })
}

/// Inverse of [`db_driver`], in the column order of the shipped file.
pub(super) fn db_driver_row(driver: &DbDriver) -> Row {
    Row::new()
        .with("DB_DRIVER_ID", driver.id.to_string())
        .with("DATASOURCE_TYPE_ID", driver.datasource_type_id.to_string())
        .with("NAME", driver.name.as_str())
        .with("DRIVER_CLASS", driver.class_name.as_str())
        .with("URL_TEMPLATE", driver.url_template.as_str())
        .with("BASE_URL_TEMPLATE", driver.base_url_template.as_str())
        .with("DRIVER_STORED", if driver.driver_stored { "1" } else { "0" })
        .with("TIMESTAMP", driver.timestamp.clone().unwrap_or_default())
}
