use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Expense,
    Income,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(TransactionType::Expense),
            "income" => Ok(TransactionType::Income),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

/// Where a transaction record came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionSource {
    #[default]
    Manual,
    SmartPaste,
    Sms,
    CsvImport,
}

/// The eight canonical transaction fields the extraction and scoring layers
/// reason about. String forms match the persisted mapping/placeholder keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Amount,
    Currency,
    Date,
    Type,
    Category,
    Subcategory,
    Vendor,
    FromAccount,
}

impl Field {
    pub const CANONICAL: [Field; 8] = [
        Field::Amount,
        Field::Currency,
        Field::Date,
        Field::Type,
        Field::Category,
        Field::Subcategory,
        Field::Vendor,
        Field::FromAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Currency => "currency",
            Field::Date => "date",
            Field::Type => "type",
            Field::Category => "category",
            Field::Subcategory => "subcategory",
            Field::Vendor => "vendor",
            Field::FromAccount => "fromAccount",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction record with every field optional: extraction may fail to
/// produce a value and no sentinel strings are used in its place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub vendor: Option<String>,
    pub from_account: Option<String>,
    #[serde(default)]
    pub source: TransactionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// A fresh, empty record with a generated id.
    pub fn new(source: TransactionSource) -> Self {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            title: None,
            amount: None,
            currency: None,
            date: None,
            kind: None,
            category: None,
            subcategory: None,
            vendor: None,
            from_account: None,
            source,
            created_at: Some(Utc::now()),
        }
    }

    /// The textual value of a canonical field, if set. Used when comparing
    /// learned mappings against a confirmed record.
    pub fn field_text(&self, field: Field) -> Option<String> {
        match field {
            Field::Amount => self.amount.map(|a| a.normalize().to_string()),
            Field::Currency => self.currency.clone(),
            Field::Date => self.date.map(|d| d.format("%Y-%m-%d").to_string()),
            Field::Type => self.kind.map(|k| k.as_str().to_string()),
            Field::Category => self.category.clone(),
            Field::Subcategory => self.subcategory.clone(),
            Field::Vendor => self.vendor.clone(),
            Field::FromAccount => self.from_account.clone(),
        }
    }

    /// Vendor if present, else title. Batch learning groups on this.
    pub fn vendor_or_title(&self) -> Option<&str> {
        self.vendor.as_deref().or(self.title.as_deref())
    }
}
