//! Form schema lookup.
//!
//! A filing row is typed by its (version, form code) pair. The tables here
//! map that pair to a canonical CSV header string via regex matching, and
//! derive a per-column type code (`s` string, `d` date, `f` decimal) by
//! matching each column name against the type table. Patterns are matched
//! case-insensitively, like the PCRE_CASELESS tables this replaces.
//!
//! The tables are a curated subset of the FEC format documentation
//! covering the common report and itemization forms; unknown pairs return
//! `None` and the caller skips the row.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::csv_helper::CsvLineParser;

/// The column layout and types for one (version, form) pair.
///
/// `field_types` holds one type code per column of `header_string`, in
/// order; `num_fields` is the column count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    pub header_string: &'static str,
    pub num_fields: usize,
    pub field_types: String,
}

// (version pattern, form pattern, header string)
static HEADERS: &[(&str, &str, &str)] = &[
    (
        r"^[89]\.[0-9]$",
        r"^hdr$",
        "record_type,ef_type,fec_ver_#,soft_name,soft_ver#,rpt_id,rpt_number,hdrcomment",
    ),
    (
        r"^[3-7]\.[0-9]$|^2\.0[0-9]$",
        r"^hdr$",
        "record_type,ef_type,fec_ver_#,soft_name,soft_ver#,name_delim,rpt_id,rpt_number,comment",
    ),
    (
        r"^[89]\.[0-9]$",
        r"^f3x[nat]?$",
        "form_type,filer_committee_id_number,committee_name,change_of_address,street_1,street_2,city,state,zip,report_code,election_code,date_of_election,state_of_election,coverage_from_date,coverage_through_date,qualified_committee,treasurer_last_name,treasurer_first_name,treasurer_middle_name,treasurer_prefix,treasurer_suffix,date_signed,col_a_cash_on_hand_beginning_period,col_a_total_receipts,col_a_total_disbursements,col_a_cash_on_hand_close_of_period",
    ),
    (
        r"^[3-7]\.[0-9]$|^2\.0[0-9]$",
        r"^f3x[nat]?$",
        "form_type,filer_committee_id_number,committee_name,street_1,street_2,city,state,zip,report_code,election_date,election_state,coverage_from_date,coverage_through_date,total_receipts_period,total_disbursements_period,cash_on_hand_close_of_period,treasurer_last_name,treasurer_first_name,date_signed",
    ),
    (
        r"^[89]\.[0-9]$",
        r"^f3[nat]?$",
        "form_type,filer_committee_id_number,committee_name,change_of_address,street_1,street_2,city,state,zip,election_state,election_district,report_code,election_code,date_of_election,state_of_election,coverage_from_date,coverage_through_date,treasurer_last_name,treasurer_first_name,treasurer_middle_name,treasurer_prefix,treasurer_suffix,date_signed,col_a_total_contributions,col_a_total_contribution_refunds,col_a_net_contributions,col_a_total_operating_expenditures,col_a_cash_on_hand_close_of_period",
    ),
    (
        r"^[89]\.[0-9]$",
        r"^sa",
        "form_type,filer_committee_id_number,transaction_id,back_reference_tran_id_number,back_reference_sched_name,entity_type,contributor_organization_name,contributor_last_name,contributor_first_name,contributor_middle_name,contributor_prefix,contributor_suffix,contributor_street_1,contributor_street_2,contributor_city,contributor_state,contributor_zip_code,election_code,election_other_description,contribution_date,contribution_amount,contribution_aggregate,contribution_purpose_descrip,contributor_employer,contributor_occupation,memo_code,memo_text_description",
    ),
    (
        r"^[3-7]\.[0-9]$|^2\.0[0-9]$",
        r"^sa",
        "form_type,filer_committee_id_number,entity_type,contributor_name,contributor_street_1,contributor_street_2,contributor_city,contributor_state,contributor_zip_code,election_code,contribution_date,contribution_amount,contribution_aggregate,contribution_purpose_code,contribution_purpose_descrip,contributor_employer,contributor_occupation,memo_code,memo_text_description,amended_cd,transaction_id",
    ),
    (
        r"^[89]\.[0-9]$",
        r"^sb",
        "form_type,filer_committee_id_number,transaction_id,back_reference_tran_id_number,back_reference_sched_name,entity_type,payee_organization_name,payee_last_name,payee_first_name,payee_middle_name,payee_prefix,payee_suffix,payee_street_1,payee_street_2,payee_city,payee_state,payee_zip_code,election_code,election_other_description,expenditure_date,expenditure_amount,semi_annual_refunded_bundled_amt,expenditure_purpose_descrip,category_code,memo_code,memo_text_description",
    ),
    (
        r"^[89]\.[0-9]$",
        r"^text$",
        "rec_type,filer_committee_id_number,transaction_id_number,back_reference_tran_id_number,back_reference_sched_form_name,text4000",
    ),
    (
        r".",
        r"^f99",
        "form_type,filer_committee_id_number,text_code,text",
    ),
];

// (version pattern, form pattern, field pattern, type code)
static TYPES: &[(&str, &str, &str, char)] = &[
    (r".", r".", r"^date_|_date$", 'd'),
    (r".", r".", r"_amount$|_aggregate$", 'f'),
    (r".", r".", r"^col_a_|^col_b_", 'f'),
    (
        r".",
        r"^f3x",
        r"^total_receipts_period$|^total_disbursements_period$|^cash_on_hand",
        'f',
    ),
    (r".", r"^sb", r"^semi_annual_refunded_bundled_amt$", 'f'),
];

struct HeaderEntry {
    version: Regex,
    form: Regex,
    header_string: &'static str,
}

struct TypeEntry {
    version: Regex,
    form: Regex,
    field: Regex,
    type_code: char,
}

fn new_regex(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("invalid mappings pattern")
}

static HEADER_TABLE: Lazy<Vec<HeaderEntry>> = Lazy::new(|| {
    HEADERS
        .iter()
        .map(|&(version, form, header_string)| HeaderEntry {
            version: new_regex(version),
            form: new_regex(form),
            header_string,
        })
        .collect()
});

static TYPE_TABLE: Lazy<Vec<TypeEntry>> = Lazy::new(|| {
    TYPES
        .iter()
        .map(|&(version, form, field, type_code)| TypeEntry {
            version: new_regex(version),
            form: new_regex(form),
            field: new_regex(field),
            type_code,
        })
        .collect()
});

/// The type code for one column, defaulting to string.
fn lookup_type(version: &str, form: &str, field_name: &str) -> char {
    for entry in TYPE_TABLE.iter() {
        if entry.version.is_match(version)
            && entry.form.is_match(form)
            && entry.field.is_match(field_name)
        {
            return entry.type_code;
        }
    }
    's'
}

/// Derive the type-code string for a header by running each column name
/// through the type table. The header string is tokenized with the same
/// parser data rows go through.
fn lookup_types(version: &str, form: &str, header_string: &str) -> String {
    let mut line = header_string.as_bytes().to_vec();
    let mut parser = CsvLineParser::new(&mut line);
    let mut types = String::new();
    loop {
        let field = parser.next_field(false);
        types.push(lookup_type(version, form, &field.as_str()));
        if parser.is_done() {
            break;
        }
    }
    types
}

/// Look up the schema for a (version, form code) pair. Returns `None` when
/// no table entry matches; the caller treats that as an unknown form.
pub fn lookup_schema(version: &str, form: &str) -> Option<FormSchema> {
    for entry in HEADER_TABLE.iter() {
        if entry.version.is_match(version) && entry.form.is_match(form) {
            let field_types = lookup_types(version, form, entry.header_string);
            return Some(FormSchema {
                header_string: entry.header_string,
                num_fields: field_types.len(),
                field_types,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdr_lookup_is_case_insensitive() {
        let schema = lookup_schema("8.3", "HDR").expect("hdr schema");
        assert_eq!(schema.num_fields, 8);
        assert!(schema.header_string.starts_with("record_type,ef_type,fec_ver_#"));
        assert!(schema.field_types.chars().all(|t| t == 's'));
    }

    #[test]
    fn schedule_a_types() {
        let schema = lookup_schema("8.3", "SA11A1").expect("sa schema");
        let columns: Vec<&str> = schema.header_string.split(',').collect();
        assert_eq!(schema.num_fields, columns.len());

        let date_idx = columns.iter().position(|c| *c == "contribution_date").unwrap();
        let amount_idx = columns.iter().position(|c| *c == "contribution_amount").unwrap();
        let aggregate_idx = columns
            .iter()
            .position(|c| *c == "contribution_aggregate")
            .unwrap();
        let types = schema.field_types.as_bytes();
        assert_eq!(types[date_idx], b'd');
        assert_eq!(types[amount_idx], b'f');
        assert_eq!(types[aggregate_idx], b'f');
        assert_eq!(types[0], b's');
    }

    #[test]
    fn legacy_version_f3x() {
        let schema = lookup_schema("2.02", "F3XA").expect("legacy f3x schema");
        assert_eq!(schema.num_fields, 19);
        let columns: Vec<&str> = schema.header_string.split(',').collect();
        let receipts_idx = columns
            .iter()
            .position(|c| *c == "total_receipts_period")
            .unwrap();
        assert_eq!(schema.field_types.as_bytes()[receipts_idx], b'f');
    }

    #[test]
    fn version_gates_the_layout() {
        let modern = lookup_schema("8.3", "F3XN").expect("modern f3x");
        let legacy = lookup_schema("2.02", "F3XN").expect("legacy f3x");
        assert_ne!(modern.header_string, legacy.header_string);
    }

    #[test]
    fn unknown_form_is_none() {
        assert!(lookup_schema("8.3", "ZZZ").is_none());
        assert!(lookup_schema("0.0", "F3XA").is_none());
    }

    #[test]
    fn f99_matches_any_version() {
        let schema = lookup_schema("2.02", "F99").expect("f99 schema");
        assert_eq!(schema.num_fields, 4);
    }

    #[test]
    fn lookup_is_idempotent() {
        let a = lookup_schema("8.3", "SA11A1").expect("schema");
        let b = lookup_schema("8.3", "SA11A1").expect("schema");
        assert_eq!(a, b);
    }
}
