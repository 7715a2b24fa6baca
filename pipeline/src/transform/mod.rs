//! Column-level normalization applied between the raw and staging layers.
//!
//! Every column of a raw table is rewritten by exactly one rule, chosen by
//! column name from a static binding. Columns that end up entirely null are
//! dropped from the staging table.

pub mod rules;

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, LargeStringArray,
    StringArray, StringViewArray, TimestampMicrosecondArray,
};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use common::{Error, Result};
use tracing::warn;

const YEAR_FIRST_COLUMNS: [&str; 5] = [
    "date_created",
    "date_updated",
    "mcs_150_form_date",
    "carrier_safety_rating_rating_date",
    "carrier_safety_rating_review_date",
];
const MONTH_FIRST_COLUMNS: [&str; 2] =
    ["review_datetime_utc", "owner_answer_timestamp_datetime_utc"];
const BOOL_COLUMNS: [&str; 3] = ["hhg_authorization", "area_service", "verified"];
const STATE_COLUMN: &str = "state";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    YearFirstDate,
    MonthFirstDatetime,
    BoolAsYesNo,
    StateName,
    ScrubSentinels,
}

/// Static column-to-rule binding. Every column not listed explicitly gets
/// the sentinel scrub.
pub fn rule_for(column: &str) -> ColumnRule {
    if YEAR_FIRST_COLUMNS.contains(&column) {
        ColumnRule::YearFirstDate
    } else if MONTH_FIRST_COLUMNS.contains(&column) {
        ColumnRule::MonthFirstDatetime
    } else if BOOL_COLUMNS.contains(&column) {
        ColumnRule::BoolAsYesNo
    } else if column == STATE_COLUMN {
        ColumnRule::StateName
    } else {
        ColumnRule::ScrubSentinels
    }
}

/// Rewrites every column of the given batches by its bound rule and drops
/// columns that are entirely null afterwards.
pub fn normalize_batches(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let schema = batches
        .first()
        .map(|batch| batch.schema())
        .ok_or_else(|| Error::EmptyResult("no batches to normalize".to_string()))?;
    let batch = concat_batches(&schema, batches)?;

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let rewritten = apply_rule(rule_for(field.name()), field.name(), column)?;
        if !rewritten.is_empty() && rewritten.null_count() == rewritten.len() {
            warn!(
                column = %field.name(),
                "Dropping column that is entirely null after normalization"
            );
            continue;
        }
        fields.push(Field::new(field.name(), rewritten.data_type().clone(), true));
        columns.push(rewritten);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn apply_rule(rule: ColumnRule, column: &str, array: &ArrayRef) -> Result<ArrayRef> {
    match rule {
        ColumnRule::YearFirstDate => year_first_to_date(array),
        ColumnRule::MonthFirstDatetime => month_first_to_timestamp(column, array),
        ColumnRule::BoolAsYesNo => truthiness_to_yes_no(column, array),
        ColumnRule::StateName => expand_states(array),
        ColumnRule::ScrubSentinels => scrub_strings(array),
    }
}

/// Collects a string column regardless of its physical encoding. Non-string
/// columns return `None` and pass through the rules unchanged.
fn string_values(array: &ArrayRef) -> Option<Vec<Option<&str>>> {
    match array.data_type() {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| a.iter().collect()),
        DataType::LargeUtf8 => array
            .as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|a| a.iter().collect()),
        DataType::Utf8View => array
            .as_any()
            .downcast_ref::<StringViewArray>()
            .map(|a| a.iter().collect()),
        _ => None,
    }
}

fn year_first_to_date(array: &ArrayRef) -> Result<ArrayRef> {
    let Some(values) = string_values(array) else {
        return Ok(array.clone());
    };
    // NaiveDate::default() is the Unix epoch, the Date32 anchor.
    let epoch = NaiveDate::default();
    let days: Vec<Option<i32>> = values
        .into_iter()
        .map(|value| {
            value
                .and_then(rules::parse_year_first_date)
                .map(|date| date.signed_duration_since(epoch).num_days() as i32)
        })
        .collect();
    Ok(Arc::new(Date32Array::from(days)))
}

fn month_first_to_timestamp(column: &str, array: &ArrayRef) -> Result<ArrayRef> {
    let Some(values) = string_values(array) else {
        return Ok(array.clone());
    };
    let mut micros = Vec::with_capacity(values.len());
    for value in values {
        match value {
            None => micros.push(None),
            Some(raw) if raw.trim().is_empty() => micros.push(None),
            Some(raw) => {
                let datetime = rules::parse_month_first_datetime(raw).map_err(|e| match e {
                    Error::Parse(msg) => Error::Parse(format!("column '{column}': {msg}")),
                    other => other,
                })?;
                micros.push(Some(datetime.and_utc().timestamp_micros()));
            }
        }
    }
    Ok(Arc::new(TimestampMicrosecondArray::from(micros)))
}

// A null flag value is truthy and renders as "Yes"; only an explicit
// falsy value renders as "No".
fn truthiness_to_yes_no(column: &str, array: &ArrayRef) -> Result<ArrayRef> {
    let rendered: Vec<&str> = if let Some(values) = array.as_any().downcast_ref::<BooleanArray>() {
        values
            .iter()
            .map(|v| rules::bool_to_yes_no(v.unwrap_or(true)))
            .collect()
    } else if let Some(values) = array.as_any().downcast_ref::<Int64Array>() {
        values
            .iter()
            .map(|v| rules::bool_to_yes_no(v.is_none_or(|n| n != 0)))
            .collect()
    } else if let Some(values) = array.as_any().downcast_ref::<Float64Array>() {
        values
            .iter()
            .map(|v| rules::bool_to_yes_no(v.is_none_or(|f| f != 0.0)))
            .collect()
    } else if let Some(values) = string_values(array) {
        values
            .into_iter()
            .map(|v| rules::bool_to_yes_no(v.is_none_or(rules::truthy_string)))
            .collect()
    } else {
        warn!(
            column = %column,
            data_type = ?array.data_type(),
            "Unsupported boolean column type; leaving values unchanged"
        );
        return Ok(array.clone());
    };
    Ok(Arc::new(StringArray::from(rendered)))
}

fn expand_states(array: &ArrayRef) -> Result<ArrayRef> {
    let Some(values) = string_values(array) else {
        return Ok(array.clone());
    };
    let expanded: Vec<Option<&str>> = values
        .into_iter()
        .map(|value| value.map(rules::expand_state_code))
        .collect();
    Ok(Arc::new(StringArray::from(expanded)))
}

fn scrub_strings(array: &ArrayRef) -> Result<ArrayRef> {
    let Some(values) = string_values(array) else {
        return Ok(array.clone());
    };
    let scrubbed: Vec<Option<&str>> = values
        .into_iter()
        .map(|value| value.and_then(rules::scrub_sentinel))
        .collect();
    Ok(Arc::new(StringArray::from(scrubbed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, array)| array).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn string_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn binding_routes_known_columns() {
        assert_eq!(rule_for("date_created"), ColumnRule::YearFirstDate);
        assert_eq!(rule_for("review_datetime_utc"), ColumnRule::MonthFirstDatetime);
        assert_eq!(rule_for("verified"), ColumnRule::BoolAsYesNo);
        assert_eq!(rule_for("state"), ColumnRule::StateName);
        assert_eq!(rule_for("company_name"), ColumnRule::ScrubSentinels);
    }

    #[test]
    fn states_expand_and_sentinels_scrub() {
        let input = batch(vec![
            (
                "state",
                Arc::new(StringArray::from(vec![Some("TX"), Some("ZZ"), None])) as ArrayRef,
            ),
            (
                "company_name",
                Arc::new(StringArray::from(vec![
                    Some("  Acme  "),
                    Some("--"),
                    Some("Best Freight"),
                ])) as ArrayRef,
            ),
        ]);

        let normalized = normalize_batches(&[input]).unwrap();
        assert_eq!(
            string_column(&normalized, "state"),
            vec![Some("Texas".to_string()), Some("ZZ".to_string()), None]
        );
        assert_eq!(
            string_column(&normalized, "company_name"),
            vec![
                Some("Acme".to_string()),
                None,
                Some("Best Freight".to_string())
            ]
        );
    }

    #[test]
    fn boolean_columns_render_yes_no() {
        let input = batch(vec![
            (
                "verified",
                Arc::new(BooleanArray::from(vec![Some(true), Some(false), None])) as ArrayRef,
            ),
            (
                "hhg_authorization",
                Arc::new(Int64Array::from(vec![Some(1), Some(0), None])) as ArrayRef,
            ),
        ]);

        let normalized = normalize_batches(&[input]).unwrap();
        assert_eq!(
            string_column(&normalized, "verified"),
            vec![
                Some("Yes".to_string()),
                Some("No".to_string()),
                Some("Yes".to_string())
            ]
        );
        assert_eq!(
            string_column(&normalized, "hhg_authorization"),
            vec![
                Some("Yes".to_string()),
                Some("No".to_string()),
                Some("Yes".to_string())
            ]
        );
    }

    #[test]
    fn missing_flag_values_count_as_set() {
        let input = batch(vec![
            (
                "area_service",
                Arc::new(StringArray::from(vec![None::<&str>, Some("no"), Some("1")]))
                    as ArrayRef,
            ),
            (
                "verified",
                Arc::new(BooleanArray::from(vec![None, Some(false), Some(true)])) as ArrayRef,
            ),
        ]);

        let normalized = normalize_batches(&[input]).unwrap();
        assert_eq!(
            string_column(&normalized, "area_service"),
            vec![
                Some("Yes".to_string()),
                Some("No".to_string()),
                Some("Yes".to_string())
            ]
        );
        assert_eq!(
            string_column(&normalized, "verified"),
            vec![
                Some("Yes".to_string()),
                Some("No".to_string()),
                Some("Yes".to_string())
            ]
        );
    }

    #[test]
    fn year_first_column_becomes_date32() {
        let input = batch(vec![(
            "date_created",
            Arc::new(StringArray::from(vec![
                Some("2024-10-01"),
                Some("bogus"),
                None,
            ])) as ArrayRef,
        )]);

        let normalized = normalize_batches(&[input]).unwrap();
        let dates = normalized
            .column_by_name("date_created")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .signed_duration_since(NaiveDate::default())
            .num_days() as i32;
        assert_eq!(dates.value(0), expected);
        assert!(dates.is_null(1));
        assert!(dates.is_null(2));
    }

    #[test]
    fn month_first_parse_failure_aborts_the_node() {
        let input = batch(vec![(
            "review_datetime_utc",
            Arc::new(StringArray::from(vec![Some("04-03-2024 10:00")])) as ArrayRef,
        )]);

        let err = normalize_batches(&[input]).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn fully_null_columns_are_dropped() {
        let input = batch(vec![
            (
                "dot_email",
                Arc::new(StringArray::from(vec![Some("--"), Some("None")])) as ArrayRef,
            ),
            (
                "company_name",
                Arc::new(StringArray::from(vec![Some("Acme"), Some("Best")])) as ArrayRef,
            ),
        ]);

        let normalized = normalize_batches(&[input]).unwrap();
        assert!(normalized.column_by_name("dot_email").is_none());
        assert!(normalized.column_by_name("company_name").is_some());
    }

    #[test]
    fn non_string_columns_pass_through_the_scrub() {
        let input = batch(vec![(
            "usdot_num",
            Arc::new(Int64Array::from(vec![Some(123), Some(456)])) as ArrayRef,
        )]);

        let normalized = normalize_batches(&[input]).unwrap();
        let ids = normalized
            .column_by_name("usdot_num")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 123);
        assert_eq!(ids.value(1), 456);
    }
}
