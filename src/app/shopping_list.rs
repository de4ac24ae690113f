use crate::domain::model::Request;
use crate::domain::ports::AliasResolver;
use crate::utils::error::{BulkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)x?\s*(.*)$").unwrap());

/// Parses `"3x Sol Ring"`, `"3 Sol Ring"` or `"Sol Ring"` (quantity 1).
pub fn parse_line(line: &str) -> Result<(String, i64)> {
    let line = line.trim();
    let Some(caps) = QUANTITY_RE.captures(line) else {
        return Ok((line.to_string(), 1));
    };

    let quantity: i64 = caps[1].parse().map_err(|_| {
        BulkError::invalid_request(format!("quantity {:?} is out of range", &caps[1]))
    })?;
    let name = caps[2].trim();
    if name.is_empty() {
        return Err(BulkError::invalid_request(format!(
            "line {:?} has a quantity but no item name",
            line
        )));
    }
    Ok((name.to_string(), quantity))
}

/// One item per line; blank lines are skipped.
pub fn parse_shopping_list(text: &str) -> Result<Vec<(String, i64)>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

/// Builds a validated request, mapping names through the alias resolver when
/// one is given. Names the resolver does not know are kept as written.
pub fn parse_request(
    text: &str,
    delivery_fee: Option<f64>,
    aliases: Option<&dyn AliasResolver>,
) -> Result<Request> {
    let mut lines = parse_shopping_list(text)?;
    if let Some(resolver) = aliases {
        for (name, _) in lines.iter_mut() {
            if let Some(canonical) = resolver.canonical_name(name) {
                *name = canonical;
            }
        }
    }
    Request::new(lines, delivery_fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::alias::{CardRecord, InMemoryAliasLibrary};

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("3x Sol Ring").unwrap(), ("Sol Ring".to_string(), 3));
        assert_eq!(parse_line("2 Lightning Bolt").unwrap(), ("Lightning Bolt".to_string(), 2));
        assert_eq!(parse_line("  Counterspell ").unwrap(), ("Counterspell".to_string(), 1));
        assert_eq!(parse_line("0 Sol Ring").unwrap(), ("Sol Ring".to_string(), 0));
    }

    #[test]
    fn test_quantity_without_name_is_rejected() {
        assert!(matches!(parse_line("4x"), Err(BulkError::InvalidRequest { .. })));
        assert!(matches!(parse_line("12"), Err(BulkError::InvalidRequest { .. })));
    }

    #[test]
    fn test_huge_quantity_is_rejected() {
        assert!(parse_line("99999999999999999999999 Sol Ring").is_err());
    }

    #[test]
    fn test_parse_request() {
        let text = "2x Sol Ring\n\n   \nLightning Bolt\n";
        let request = parse_request(text, Some(300.0), None).unwrap();

        assert_eq!(request.quantity("sol ring"), Some(2));
        assert_eq!(request.quantity("lightning bolt"), Some(1));
        assert_eq!(request.delivery_fee(), 300.0);
        assert!(!request.has_only_singles());
    }

    #[test]
    fn test_parse_request_errors() {
        assert!(matches!(
            parse_request("Sol Ring\nsol ring", None, None),
            Err(BulkError::InvalidRequest { .. })
        ));
        assert!(matches!(
            parse_request("0 Sol Ring", None, None),
            Err(BulkError::InvalidRequest { .. })
        ));
        assert!(matches!(
            parse_request("\n\n", None, None),
            Err(BulkError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_aliases_map_to_canonical_names() {
        let library = InMemoryAliasLibrary::from_records(vec![CardRecord {
            oracle_id: "o-ring".to_string(),
            name: "Sol Ring".to_string(),
            printed_name: Some("Кольцо Солнца".to_string()),
            lang: Some("ru".to_string()),
        }]);

        let request = parse_request("Кольцо Солнца\nUnknown Card", None, Some(&library)).unwrap();

        assert_eq!(request.quantity("sol ring"), Some(1));
        assert_eq!(request.quantity("unknown card"), Some(1));
    }
}
