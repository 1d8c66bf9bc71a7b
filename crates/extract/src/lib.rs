pub mod dates;
pub mod fields;
pub mod normalize;

pub use dates::normalize_date;
pub use fields::{extract_template, extract_vendor_name, ExtractError, ExtractedTemplate};
pub use normalize::{normalize_structure, NormalizedTemplate};

// Compiled regex cache — one lazily-built static per pattern.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}
pub(crate) use re;
