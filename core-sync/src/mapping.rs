//! # Column Mapper
//!
//! Derives a destination-column → source-header mapping from names alone,
//! and supplies hand-maintained column lists for tables whose schema cannot
//! be introspected.
//!
//! ## Matching
//!
//! Names are normalized by keeping alphanumeric characters only, lowercased,
//! so `tour_date`, `Tour Date` and `TOUR-DATE` all compare equal.
//!
//! 1. Exact normalized matches are assigned first, for every destination
//!    column, in source order.
//! 2. Remaining destination columns take the unclaimed source header that
//!    contains (or is contained in) their name, provided the shorter name is
//!    at least [`MIN_CONTAINMENT_RATIO`] of the longer one. The longest
//!    overlap wins; ties go to the earliest source header.
//!
//! Each source header is assigned to at most one destination column.

use bridge_traits::database::ColumnInfo;
use std::collections::{BTreeMap, HashSet};

/// Destination column name → source header name.
pub type ColumnMapping = BTreeMap<String, String>;

/// Shortest accepted length of the contained name relative to the container.
pub const MIN_CONTAINMENT_RATIO: f64 = 0.6;

pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Propose a mapping for `destination` columns from `source` headers.
///
/// Pure: the same inputs always produce the same mapping. Destination columns
/// without an acceptable match are left out.
pub fn get_auto_mapping(destination: &[ColumnInfo], source: &[String]) -> ColumnMapping {
    let sources: Vec<(usize, String)> = source
        .iter()
        .enumerate()
        .map(|(i, s)| (i, normalize(s)))
        .filter(|(_, n)| !n.is_empty())
        .collect();

    let mut mapping = ColumnMapping::new();
    let mut claimed: HashSet<usize> = HashSet::new();

    for column in destination {
        if mapping.contains_key(&column.name) {
            continue;
        }
        let wanted = normalize(&column.name);
        if wanted.is_empty() {
            continue;
        }
        if let Some((index, _)) = sources
            .iter()
            .find(|(i, n)| !claimed.contains(i) && *n == wanted)
        {
            claimed.insert(*index);
            mapping.insert(column.name.clone(), source[*index].clone());
        }
    }

    for column in destination {
        if mapping.contains_key(&column.name) {
            continue;
        }
        let wanted = normalize(&column.name);
        if wanted.is_empty() {
            continue;
        }

        let mut best: Option<(usize, usize)> = None;
        for (index, candidate) in &sources {
            if claimed.contains(index) {
                continue;
            }
            let Some(overlap) = containment_overlap(&wanted, candidate) else {
                continue;
            };
            if best.map_or(true, |(_, len)| overlap > len) {
                best = Some((*index, overlap));
            }
        }

        if let Some((index, _)) = best {
            claimed.insert(index);
            mapping.insert(column.name.clone(), source[index].clone());
        }
    }

    mapping
}

/// Length of the contained name when one normalized name contains the other
/// and the ratio threshold holds.
fn containment_overlap(a: &str, b: &str) -> Option<usize> {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if !longer.contains(shorter) {
        return None;
    }
    let short_len = shorter.chars().count();
    let long_len = longer.chars().count();
    if (short_len as f64) < MIN_CONTAINMENT_RATIO * long_len as f64 {
        return None;
    }
    Some(short_len)
}

/// A mapping checked against the live destination columns and sheet header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingReport {
    /// Entries whose key is a destination column and whose value is a header.
    pub effective: ColumnMapping,
    /// Keys that are not destination columns.
    pub unknown_destinations: Vec<String>,
    /// Values that no longer match a header; treated as unmapped.
    pub stale_sources: Vec<String>,
}

/// Split `mapping` into usable entries and the ones that no longer apply.
pub fn check_mapping(
    mapping: &ColumnMapping,
    destination: &[ColumnInfo],
    source: &[String],
) -> MappingReport {
    let columns: HashSet<&str> = destination.iter().map(|c| c.name.as_str()).collect();
    let headers: HashSet<&str> = source.iter().map(|s| s.trim()).collect();

    let mut report = MappingReport::default();
    for (dest, src) in mapping {
        if !columns.contains(dest.as_str()) {
            report.unknown_destinations.push(dest.clone());
        } else if src.trim().is_empty() {
            continue;
        } else if !headers.contains(src.trim()) {
            report.stale_sources.push(src.clone());
        } else {
            report.effective.insert(dest.clone(), src.clone());
        }
    }
    report
}

/// Columns assumed for `table` when its schema cannot be read.
///
/// Hand-maintained; a degraded-mode answer, not a source of truth. Unknown
/// tables get a generic identifier/timestamp list so the caller always has
/// something to map against.
pub fn get_fallback_columns(table: &str) -> Vec<ColumnInfo> {
    let text = |name: &str| ColumnInfo::new(name, "TEXT");
    let int = |name: &str| ColumnInfo::new(name, "INTEGER");
    let real = |name: &str| ColumnInfo::new(name, "REAL");

    match table {
        "reservations" => vec![
            ColumnInfo::new("reservation_no", "TEXT").primary_key(),
            text("customer_name"),
            text("customer_phone"),
            text("customer_email"),
            text("product_name"),
            text("option_name"),
            text("tour_date"),
            int("adults"),
            int("children"),
            int("infants"),
            text("pickup_location"),
            text("pickup_time"),
            real("total_price"),
            text("channel"),
            text("status"),
            text("memo"),
            text("created_at"),
        ],
        "products" => vec![
            ColumnInfo::new("product_code", "TEXT").primary_key(),
            text("name"),
            text("category"),
            real("base_price"),
            int("duration_minutes"),
            ColumnInfo::new("is_active", "BOOLEAN"),
            text("description"),
        ],
        "product_options" => vec![
            ColumnInfo::new("option_code", "TEXT").primary_key(),
            text("product_code"),
            text("name"),
            real("price"),
            ColumnInfo::new("is_active", "BOOLEAN"),
        ],
        "pickup_schedules" => vec![
            ColumnInfo::new("id", "TEXT").primary_key(),
            text("tour_date"),
            text("pickup_location"),
            text("pickup_time"),
            text("vehicle"),
            text("guide_name"),
            int("passengers"),
        ],
        "expenses" => vec![
            ColumnInfo::new("id", "TEXT").primary_key(),
            text("expense_date"),
            text("category"),
            text("description"),
            real("amount"),
            text("currency"),
            text("paid_by"),
            text("memo"),
        ],
        "settlements" => vec![
            ColumnInfo::new("id", "TEXT").primary_key(),
            text("settlement_month"),
            text("channel"),
            real("gross_amount"),
            real("commission"),
            real("net_amount"),
            text("status"),
        ],
        _ => vec![
            ColumnInfo::new("id", "TEXT").primary_key(),
            text("created_at"),
            text("updated_at"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ColumnInfo> {
        names.iter().map(|n| ColumnInfo::new(*n, "TEXT")).collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Tour Date"), "tourdate");
        assert_eq!(normalize("tour_date"), "tourdate");
        assert_eq!(normalize(" TOUR-DATE (KST) "), "tourdatekst");
        assert_eq!(normalize("예약 번호"), "예약번호");
        assert_eq!(normalize("__"), "");
    }

    #[test]
    fn test_name_date_price_example() {
        let mapping = get_auto_mapping(
            &columns(&["name", "tour_date", "base_price"]),
            &headers(&["Name", "Tour Date", "Price"]),
        );

        assert_eq!(mapping.get("name").map(String::as_str), Some("Name"));
        assert_eq!(mapping.get("tour_date").map(String::as_str), Some("Tour Date"));
        assert!(!mapping.contains_key("base_price"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_containment_above_threshold_is_accepted() {
        let mapping = get_auto_mapping(&columns(&["tour_date"]), &headers(&["Tour Date (KST)"]));
        assert_eq!(
            mapping.get("tour_date").map(String::as_str),
            Some("Tour Date (KST)")
        );
    }

    #[test]
    fn test_exact_match_beats_earlier_containment() {
        let mapping = get_auto_mapping(
            &columns(&["price"]),
            &headers(&["Prices", "price"]),
        );
        assert_eq!(mapping.get("price").map(String::as_str), Some("price"));
    }

    #[test]
    fn test_exact_claims_are_assigned_before_containment() {
        // "phone" would take "Phone No" by containment if processed first,
        // but "phone_no" claims it exactly.
        let mapping = get_auto_mapping(
            &columns(&["phone", "phone_no"]),
            &headers(&["Phone No", "Phones"]),
        );
        assert_eq!(mapping.get("phone_no").map(String::as_str), Some("Phone No"));
        assert_eq!(mapping.get("phone").map(String::as_str), Some("Phones"));
    }

    #[test]
    fn test_longest_overlap_wins() {
        let mapping = get_auto_mapping(
            &columns(&["customer_name"]),
            &headers(&["Customer", "Customer Nam"]),
        );
        assert_eq!(
            mapping.get("customer_name").map(String::as_str),
            Some("Customer Nam")
        );
    }

    #[test]
    fn test_equal_overlap_goes_to_first_source() {
        let mapping = get_auto_mapping(
            &columns(&["customername"]),
            &headers(&["Customer Name 1", "Customer Name (EN)"]),
        );
        assert_eq!(
            mapping.get("customername").map(String::as_str),
            Some("Customer Name 1")
        );
    }

    #[test]
    fn test_source_header_used_once() {
        let mapping = get_auto_mapping(
            &columns(&["memo", "memos"]),
            &headers(&["Memo"]),
        );
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("memo").map(String::as_str), Some("Memo"));
    }

    #[test]
    fn test_keys_come_from_destination_and_are_unique() {
        let destination = columns(&["id", "name", "name", "tour_date"]);
        let source = headers(&["ID", "Name", "Tour date", "Extra"]);
        let mapping = get_auto_mapping(&destination, &source);

        let names: HashSet<&str> = destination.iter().map(|c| c.name.as_str()).collect();
        assert!(mapping.keys().all(|k| names.contains(k.as_str())));
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let destination = columns(&["name", "tour_date", "pickup", "memo"]);
        let source = headers(&["Memo", "Pickup Location", "Name", "Tour Date"]);

        let first = get_auto_mapping(&destination, &source);
        for _ in 0..10 {
            assert_eq!(get_auto_mapping(&destination, &source), first);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(get_auto_mapping(&[], &headers(&["Name"])).is_empty());
        assert!(get_auto_mapping(&columns(&["name"]), &[]).is_empty());
        assert!(get_auto_mapping(&columns(&["name"]), &headers(&["", "  "])).is_empty());
    }

    #[test]
    fn test_check_mapping_separates_stale_entries() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("name".into(), "Name".into());
        mapping.insert("tour_date".into(), "Date".into());
        mapping.insert("deleted_column".into(), "Memo".into());
        mapping.insert("memo".into(), "".into());

        let report = check_mapping(
            &mapping,
            &columns(&["name", "tour_date", "memo"]),
            &headers(&["Name", "Tour Date", "Memo"]),
        );

        assert_eq!(report.effective.len(), 1);
        assert_eq!(report.effective.get("name").map(String::as_str), Some("Name"));
        assert_eq!(report.unknown_destinations, vec!["deleted_column"]);
        assert_eq!(report.stale_sources, vec!["Date"]);
    }

    #[test]
    fn test_fallback_columns_never_empty() {
        for table in ["reservations", "products", "expenses", "unknown_table"] {
            assert!(!get_fallback_columns(table).is_empty(), "{}", table);
        }
        assert!(get_fallback_columns("reservations")[0].primary_key);
    }
}
