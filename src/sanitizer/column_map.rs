//! Column Name Normalization
//!
//! Maps alternate spellings the generator tends to produce (snake_case,
//! flattened lower case) onto the store's case-sensitive column names.

use crate::error::{HealerError, Result};
use std::path::Path;

/// Ordered alternate → canonical column spellings.
///
/// Lookups are whole-word and case-insensitive. Construction rejects an
/// alternate mapped to two canonicals, and a canonical that a later entry
/// would rewrite into something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    entries: Vec<(String, String)>,
}

const INVOICE_COLUMNS: &[(&str, &str)] = &[
    ("total_amount", "totalAmount"),
    ("totalamount", "totalAmount"),
    ("sub_total", "subtotal"),
    ("subtotal", "subtotal"),
    ("tax_amount", "taxAmount"),
    ("taxamount", "taxAmount"),
    ("discount_amount", "discountAmount"),
    ("discountamount", "discountAmount"),
    ("issue_date", "issueDate"),
    ("issuedate", "issueDate"),
    ("due_date", "dueDate"),
    ("duedate", "dueDate"),
    ("invoice_number", "invoiceNumber"),
    ("invoicenumber", "invoiceNumber"),
    ("vendor_id", "vendorId"),
    ("vendorid", "vendorId"),
    ("customer_id", "customerId"),
    ("customerid", "customerId"),
    ("status", "status"),
];

impl ColumnMap {
    pub fn new<I, A, C>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();

        for (alternate, canonical) in pairs {
            let alternate: String = alternate.into();
            let canonical: String = canonical.into();
            if !is_word(&alternate) || !is_word(&canonical) {
                return Err(HealerError::Config(format!(
                    "column map entry '{}' → '{}' is not a plain identifier",
                    alternate, canonical
                )));
            }

            let key = alternate.to_lowercase();
            if let Some((_, existing)) = entries.iter().find(|(alt, _)| *alt == key) {
                if *existing != canonical {
                    return Err(HealerError::Config(format!(
                        "column map sends '{}' to both '{}' and '{}'",
                        alternate, existing, canonical
                    )));
                }
                continue;
            }

            // A later entry must not rewrite an earlier canonical name
            let rewritten = entries.iter().find(|(_, earlier)| {
                earlier.to_lowercase() == key && *earlier != canonical
            });
            if let Some((_, earlier)) = rewritten {
                return Err(HealerError::Config(format!(
                    "column map entry '{}' → '{}' would undo canonical name '{}'",
                    alternate, canonical, earlier
                )));
            }

            entries.push((key, canonical));
        }

        Ok(Self { entries })
    }

    /// Load a JSON object of `"alternate": "canonical"` pairs, in file order
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        let mut pairs = Vec::with_capacity(object.len());
        for (alternate, canonical) in object {
            let canonical = canonical.as_str().ok_or_else(|| {
                HealerError::Config(format!(
                    "column map value for '{}' must be a string",
                    alternate
                ))
            })?;
            pairs.push((alternate, canonical.to_string()));
        }
        Self::new(pairs)
    }

    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Canonical name for a whole word, if the word is a known alternate
    pub fn lookup(&self, word: &str) -> Option<&str> {
        let key = word.to_lowercase();
        self.entries
            .iter()
            .find(|(alternate, _)| *alternate == key)
            .map(|(_, canonical)| canonical.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            entries: INVOICE_COLUMNS
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
        }
    }
}

fn is_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_map_is_valid() {
        let pairs: Vec<(&str, &str)> = INVOICE_COLUMNS.to_vec();
        let map = ColumnMap::new(pairs).unwrap();
        assert_eq!(map, ColumnMap::default());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let map = ColumnMap::default();
        assert_eq!(map.lookup("TOTAL_AMOUNT"), Some("totalAmount"));
        assert_eq!(map.lookup("VendorId"), Some("vendorId"));
        assert_eq!(map.lookup("total_amount_x"), None);
    }

    #[test]
    fn test_conflicting_alternate_rejected() {
        let err = ColumnMap::new([("due", "dueDate"), ("DUE", "dueAt")]).unwrap_err();
        assert!(matches!(err, HealerError::Config(_)));
    }

    #[test]
    fn test_repeated_identical_entry_is_collapsed() {
        let map = ColumnMap::new([("vendor_id", "vendorId"), ("vendor_id", "vendorId")]).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_later_entry_cannot_undo_canonical() {
        let err = ColumnMap::new([("total", "amount"), ("amount", "total")]).unwrap_err();
        assert!(matches!(err, HealerError::Config(_)));
    }

    #[test]
    fn test_from_json_file_keeps_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"paid_at": "paidAt", "paidat": "paidAt", "amt": "amount"}}"#).unwrap();

        let map = ColumnMap::from_json_file(file.path()).unwrap();
        let alternates: Vec<&str> = map.entries().map(|(a, _)| a).collect();
        assert_eq!(alternates, vec!["paid_at", "paidat", "amt"]);
    }
}
