//! Phone number validation of dataset rows.
//!
//! A deliberately simple structural check: keep the digits of the cell and
//! accept between 8 and 15 of them. No numbering-plan rules, no lookups.

use common::model::dataset::{CellValue, Dataset};
use common::model::verdict::ValidationVerdict;

pub const MIN_DIGITS: usize = 8;
pub const MAX_DIGITS: usize = 15;

pub const REASON_NO_COLUMN: &str = "no column selected";
pub const REASON_EMPTY: &str = "empty phone number";

/// One verdict per row of `dataset`, in row order.
///
/// Without a selected column every row is invalid with
/// [`REASON_NO_COLUMN`].
pub fn validate(dataset: &Dataset, column: Option<&str>) -> Vec<ValidationVerdict> {
    let Some(column) = column.filter(|c| !c.is_empty()) else {
        return (0..dataset.len())
            .map(|idx| ValidationVerdict::invalid(idx, REASON_NO_COLUMN))
            .collect();
    };

    dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| validate_value(idx, row.get(column)))
        .collect()
}

pub fn validate_value(row_index: usize, value: Option<&CellValue>) -> ValidationVerdict {
    let Some(value) = value.filter(|v| !v.is_blank()) else {
        return ValidationVerdict::invalid(row_index, REASON_EMPTY);
    };

    let digits = digits_only(&value.as_text());
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
        return ValidationVerdict::invalid(
            row_index,
            format!("invalid length ({} digits)", digits.len()),
        );
    }

    ValidationVerdict::valid(row_index, digits)
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
