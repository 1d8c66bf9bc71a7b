use std::io::Read;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use qirsh_core::{Transaction, TransactionSource, TransactionType};
use qirsh_extract::normalize_date;

/// Column layout of an exported statement file. Any unmapped column is
/// simply left unset on the resulting records.
#[derive(Debug, Clone)]
pub struct CsvColumnMapping {
    pub date_column: Option<usize>,
    pub title_column: Option<usize>,
    pub vendor_column: Option<usize>,
    pub amount_column: Option<usize>,
    pub currency_column: Option<usize>,
    pub type_column: Option<usize>,
    pub category_column: Option<usize>,
    pub subcategory_column: Option<usize>,
    pub date_format: String,
}

impl Default for CsvColumnMapping {
    fn default() -> Self {
        Self {
            date_column: None,
            title_column: None,
            vendor_column: None,
            amount_column: None,
            currency_column: None,
            type_column: None,
            category_column: None,
            subcategory_column: None,
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvIngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No data rows")]
    NoDataRows,
}

/// Read transaction records out of a statement CSV for batch learning.
///
/// Individual cells are parsed tolerantly: an unreadable date or amount
/// leaves that field unset rather than failing the row, and a failed row is
/// skipped with a warning rather than aborting the file.
pub fn read_transactions<R: Read>(
    data: R,
    mapping: &CsvColumnMapping,
    has_header: bool,
) -> Result<Vec<Transaction>, CsvIngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(data);

    let mut transactions = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(row = index, %err, "skipping unreadable CSV row");
                continue;
            }
        };
        if record.is_empty() {
            continue;
        }

        let cell = |column: Option<usize>| -> Option<&str> {
            column
                .and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let mut txn = Transaction::new(TransactionSource::CsvImport);
        txn.date = cell(mapping.date_column).and_then(|s| {
            chrono::NaiveDate::parse_from_str(s, &mapping.date_format)
                .ok()
                .or_else(|| normalize_date(s))
        });
        txn.title = cell(mapping.title_column).map(str::to_string);
        txn.vendor = cell(mapping.vendor_column).map(str::to_string);
        txn.amount = cell(mapping.amount_column).and_then(parse_amount);
        txn.currency = cell(mapping.currency_column).map(|s| s.to_uppercase());
        txn.kind = cell(mapping.type_column).and_then(|s| TransactionType::from_str(s).ok());
        txn.category = cell(mapping.category_column).map(str::to_string);
        txn.subcategory = cell(mapping.subcategory_column).map(str::to_string);

        transactions.push(txn);
    }

    if transactions.is_empty() {
        return Err(CsvIngestError::NoDataRows);
    }
    Ok(transactions)
}

/// Tolerant amount parsing: thousands separators, currency symbols, and
/// accounting-style parentheses for negatives.
fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned = s.replace([',', '$', ' '], "");
    let mut amount = Decimal::from_str(&cleaned).ok()?;
    if negative {
        amount = -amount;
    }
    Some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> CsvColumnMapping {
        CsvColumnMapping {
            date_column: Some(0),
            vendor_column: Some(1),
            amount_column: Some(2),
            type_column: Some(3),
            category_column: Some(4),
            subcategory_column: Some(5),
            ..CsvColumnMapping::default()
        }
    }

    #[test]
    fn reads_classified_rows() {
        let data = b"date,vendor,amount,type,category,subcategory\n\
            2024-01-15,Carrefour,150.00,expense,Food,Groceries\n\
            2024-01-16,Netflix,45.00,expense,Entertainment,Streaming\n";
        let txns = read_transactions(data.as_ref(), &mapping(), true).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].vendor.as_deref(), Some("Carrefour"));
        assert_eq!(txns[0].amount, Some(Decimal::from_str("150.00").unwrap()));
        assert_eq!(txns[0].kind, Some(TransactionType::Expense));
        assert_eq!(
            txns[0].date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn bad_cells_leave_fields_unset() {
        let data = b"date,vendor,amount,type,category,subcategory\n\
            garbage,Carrefour,not-a-number,mystery,Food,\n";
        let txns = read_transactions(data.as_ref(), &mapping(), true).unwrap();
        assert_eq!(txns.len(), 1);
        assert!(txns[0].date.is_none());
        assert!(txns[0].amount.is_none());
        assert!(txns[0].kind.is_none());
        assert_eq!(txns[0].category.as_deref(), Some("Food"));
        assert!(txns[0].subcategory.is_none());
    }

    #[test]
    fn alternate_date_formats_fall_back_to_the_normalizer() {
        let data = b"date,vendor,amount,type,category,subcategory\n\
            15/01/2024,Carrefour,10,expense,Food,\n";
        let txns = read_transactions(data.as_ref(), &mapping(), true).unwrap();
        assert_eq!(
            txns[0].date,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn accounting_negatives_and_separators() {
        assert_eq!(parse_amount("1,234.56"), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_amount("(75.25)"), Decimal::from_str("-75.25").ok());
        assert_eq!(parse_amount("$99.99"), Decimal::from_str("99.99").ok());
        assert_eq!(parse_amount("junk"), None);
    }

    #[test]
    fn empty_file_is_an_error() {
        let data = b"date,vendor,amount,type,category,subcategory\n";
        assert!(matches!(
            read_transactions(data.as_ref(), &mapping(), true),
            Err(CsvIngestError::NoDataRows)
        ));
    }
}
