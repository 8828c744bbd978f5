use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::event::EventKind;
use super::numbers::parse_grouped_u64;

/// One way of reading a sale line. Tried in declaration order.
enum SaleMatcher {
    /// Both numbers captured by one pattern (`items` and `kamas` groups).
    Ordered(Regex),
    /// A gate pattern plus independent item/kamas searches, for phrasings
    /// where the two numbers can appear in either order with free text between.
    Flexible { gate: Regex, items: Regex, kamas: Regex },
}

const NUMBER: &str = r"\d[\d\s,]*?";

static SALE_MATCHERS: LazyLock<Vec<SaleMatcher>> = LazyLock::new(|| {
    let ordered = |pattern: String| SaleMatcher::Ordered(Regex::new(&pattern).expect("sale pattern"));
    vec![
        // Vous avez vendu 3 objets pour un prix total de 1 500 kamas.
        ordered(format!(
            r"(?i)(?:vous avez vendu|you (?:have )?sold)\s+(?P<items>{NUMBER})\s+(?:objets?|items?)\s+(?:pour un (?:prix )?total de|for a total of|for)\s+(?P<kamas>{NUMBER})\s*(?:kamas|₭)"
        )),
        // 1 500 kamas gagnés grâce à la vente de 3 objets.
        ordered(format!(
            r"(?i)(?P<kamas>{NUMBER})\s*(?:kamas|₭).*?(?:vente de|from selling|for selling)\s+(?P<items>{NUMBER})\s+(?:objets?|items?)"
        )),
        SaleMatcher::Flexible {
            gate: Regex::new(r"(?i)\b(?:vendu|vendus|vente|sold)\b").expect("sale gate pattern"),
            items: Regex::new(&format!(r"(?i)(?P<n>{NUMBER})\s+(?:objets?|items?)\b"))
                .expect("sale item count pattern"),
            kamas: Regex::new(&format!(r"(?i)(?P<n>{NUMBER})\s*(?:kamas|₭)"))
                .expect("sale amount pattern"),
        },
    ]
});

fn number(caps: &Captures<'_>, group: &str) -> Option<u64> {
    parse_grouped_u64(caps.name(group)?.as_str())
}

impl SaleMatcher {
    fn extract(&self, line: &str) -> Option<(u64, u64)> {
        match self {
            Self::Ordered(pattern) => {
                let caps = pattern.captures(line)?;
                Some((number(&caps, "items")?, number(&caps, "kamas")?))
            }
            Self::Flexible { gate, items, kamas } => {
                if !gate.is_match(line) {
                    return None;
                }
                let item_count = number(&items.captures(line)?, "n")?;
                let total = number(&kamas.captures(line)?, "n")?;
                Some((item_count, total))
            }
        }
    }
}

/// Try each sale phrasing in order; the first one yielding positive counts wins.
pub fn extract_sale(line: &str) -> Option<EventKind> {
    SALE_MATCHERS.iter().find_map(|matcher| {
        let (item_count, total_currency) = matcher.extract(line)?;
        (item_count > 0 && total_currency > 0).then_some(EventKind::SaleCompleted {
            item_count,
            total_currency,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(item_count: u64, total_currency: u64) -> Option<EventKind> {
        Some(EventKind::SaleCompleted {
            item_count,
            total_currency,
        })
    }

    #[test]
    fn test_fixed_order() {
        assert_eq!(
            extract_sale("Vous avez vendu 3 objets pour un prix total de 1 500 kamas pendant votre absence."),
            sale(3, 1500)
        );
        assert_eq!(extract_sale("You sold 1 item for a total of 250 kamas."), sale(1, 250));
    }

    #[test]
    fn test_reversed_order() {
        assert_eq!(
            extract_sale("Vous avez gagné 12\u{202f}000 kamas grâce à la vente de 4 objets."),
            sale(4, 12_000)
        );
    }

    #[test]
    fn test_flexible_phrasing() {
        assert_eq!(
            extract_sale("Hôtel de vente : 2 objets vendus, gain 800 kamas"),
            sale(2, 800)
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        assert_eq!(extract_sale("Vous avez vendu 3 objets pour un prix total de 0 kamas."), None);
    }

    #[test]
    fn test_non_sale_line() {
        assert_eq!(extract_sale("Vous avez ramassé 3x Bois de frêne ."), None);
        assert_eq!(extract_sale("Vous avez 3 objets et 500 kamas."), None);
    }
}
