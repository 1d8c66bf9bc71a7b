use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qirsh_core::TransactionType;

use crate::kv::KeyValueStore;
use crate::vendors::VendorFallbackEntry;
use crate::{keys, load_json_or_default, save_json};

/// One entry of the flat type-keyword list: a token whose presence in a
/// message implies a transaction type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeKeyword {
    pub keyword: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

/// Bootstrap data supplied by the host on first run. The engine only reads
/// it; it never regenerates or augments the seed itself.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub vendor_fallbacks: BTreeMap<String, VendorFallbackEntry>,
    pub type_keywords: Vec<TypeKeyword>,
}

impl SeedData {
    /// The stock type-keyword list shipped with the app, covering English
    /// and Arabic bank SMS phrasing. Hosts may pass their own list instead.
    pub fn builtin_type_keywords() -> Vec<TypeKeyword> {
        fn kw(keyword: &str, kind: TransactionType) -> TypeKeyword {
            TypeKeyword {
                keyword: keyword.to_string(),
                kind,
            }
        }
        use TransactionType::{Expense, Income, Transfer};
        vec![
            kw("purchase", Expense),
            kw("pos", Expense),
            kw("mada", Expense),
            kw("spent", Expense),
            kw("paid", Expense),
            kw("atm withdrawal", Expense),
            kw("fuel", Expense),
            kw("food", Expense),
            kw("market", Expense),
            kw("شراء", Expense),
            kw("خصم", Expense),
            kw("بطاقة", Expense),
            kw("salary", Income),
            kw("deposit", Income),
            kw("credited", Income),
            kw("received", Income),
            kw("bonus", Income),
            kw("commission", Income),
            kw("incentive", Income),
            kw("حوالة واردة", Income),
            kw("دفعة", Income),
            kw("transfer", Transfer),
            kw("sent", Transfer),
            kw("received from", Transfer),
            kw("sent to", Transfer),
            kw("تحويل", Transfer),
            kw("نقل", Transfer),
            kw("ارسال", Transfer),
            kw("bank to bank", Transfer),
            kw("wallet", Transfer),
            kw("iban", Transfer),
        ]
    }
}

/// Write the seed datasets under their versioned keys, but only where no
/// value exists yet. Safe to call on every startup.
pub fn initialize_defaults(store: &dyn KeyValueStore, seed: &SeedData) {
    if store.get(keys::VENDOR_FALLBACKS).is_none() {
        save_json(store, keys::VENDOR_FALLBACKS, &seed.vendor_fallbacks);
    }
    if store.get(keys::TYPE_KEYWORDS).is_none() {
        save_json(store, keys::TYPE_KEYWORDS, &seed.type_keywords);
    }
}

pub fn load_type_keywords(store: &dyn KeyValueStore) -> Vec<TypeKeyword> {
    load_json_or_default(store, keys::TYPE_KEYWORDS)
}
