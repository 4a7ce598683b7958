use crate::constants::{HASH_SUFFIX_LENGTH, MAX_IDENTIFIER_LENGTH};

/// Shortens identifiers that exceed the engine limit: the head of the name
/// is kept and a hash of the full name keeps the result unique.
pub fn limit_name(name: &str) -> String {
    if name.chars().count() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }
    let head: String = name
        .chars()
        .take(MAX_IDENTIFIER_LENGTH - HASH_SUFFIX_LENGTH)
        .collect();
    let hash = format!("{:X}", md5::compute(name.as_bytes()));
    format!("{}{}", head, &hash[..HASH_SUFFIX_LENGTH])
}

/// `grain_name`, the flattened object name for engines without schemas.
pub fn flat_name(grain: &str, name: &str) -> String {
    limit_name(&format!("{}_{}", grain, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_untouched() {
        assert_eq!(limit_name("pk_orders"), "pk_orders");
    }

    #[test]
    fn test_long_names_hashed() {
        let long = "mvInsertFromshop_order_linesToshop_order_totals";
        let limited = limit_name(long);
        assert_eq!(limited.len(), MAX_IDENTIFIER_LENGTH);
        assert!(limited.starts_with(&long[..22]));
        assert_eq!(limited, limit_name(long));
        assert_ne!(
            limited,
            limit_name("mvInsertFromshop_order_linesToshop_order_counts")
        );
    }

    #[test]
    fn test_flat_name() {
        assert_eq!(flat_name("shop", "orders"), "shop_orders");
    }
}
