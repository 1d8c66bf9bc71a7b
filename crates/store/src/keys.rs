//! Versioned storage keys. All engine state lives under these fixed names so
//! the host can inspect, export, or clear it.

pub const TEMPLATES: &str = "qirsh_templates_v1";
pub const KEYWORD_BANK: &str = "qirsh_keyword_bank_v1";
pub const VENDOR_FALLBACKS: &str = "qirsh_vendor_fallbacks_v1";
pub const VENDOR_MAP: &str = "qirsh_vendor_map_v1";
pub const FROM_ACCOUNT_MAP: &str = "qirsh_fromaccount_map_v1";
pub const TYPE_KEYWORDS: &str = "qirsh_type_keywords_v1";
