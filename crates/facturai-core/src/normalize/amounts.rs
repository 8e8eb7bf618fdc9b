//! Monetary amount parsing into exact decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which character separates decimals in textual amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalConvention {
    /// Guess from the string: the last separator is the decimal one.
    #[default]
    Auto,
    /// `1.234,56` (Spain and most of continental Europe).
    CommaDecimal,
    /// `1,234.56` (UK, US).
    DotDecimal,
}

const CURRENCY_SYMBOLS: &[(char, &str)] = &[('€', "EUR"), ('$', "USD"), ('£', "GBP"), ('¥', "JPY")];

fn is_decoration(c: char) -> bool {
    c.is_whitespace() || c.is_alphabetic() || CURRENCY_SYMBOLS.iter().any(|(s, _)| *s == c)
}

/// Currency code implied by a symbol in `s`, if any.
pub fn currency_from_symbol(s: &str) -> Option<&'static str> {
    s.chars()
        .find_map(|c| CURRENCY_SYMBOLS.iter().find(|(sym, _)| *sym == c))
        .map(|(_, code)| *code)
}

/// Parse a JSON number without going through binary floating point math.
pub fn amount_from_number(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parse a textual amount such as `"1.234,56 €"`, `"$1,234.56"` or `"(12.50)"`.
///
/// Currency symbols and codes around the number are ignored. Returns `None`
/// when the text is not a recognizable amount.
pub fn parse_amount(s: &str, convention: DecimalConvention) -> Option<Decimal> {
    let mut s = s.trim();
    let mut negative = false;

    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        negative = true;
        s = &s[1..s.len() - 1];
    }

    s = s.trim_matches(is_decoration);
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_suffix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    s = s.trim_matches(is_decoration);

    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut compact = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '0'..='9' | ',' | '.' => compact.push(c),
            '\'' | '\u{00a0}' | '\u{202f}' => {}
            c if c.is_whitespace() => {}
            _ => return None,
        }
    }

    let normalized = normalize_separators(&compact, convention)?;
    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Rewrite `compact` (digits, commas, dots) as a plain `1234.56` string.
fn normalize_separators(compact: &str, convention: DecimalConvention) -> Option<String> {
    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();

    match (commas, dots) {
        (0, 0) => Some(compact.to_string()),
        (_, 0) => single_kind(compact, ',', commas, convention),
        (0, _) => single_kind(compact, '.', dots, convention),
        _ => {
            let comma_pos = compact.rfind(',')?;
            let dot_pos = compact.rfind('.')?;
            let (decimal, thousands) = if comma_pos > dot_pos { (',', '.') } else { ('.', ',') };

            // The decimal separator must occur once, after every grouping separator
            if compact.matches(decimal).count() != 1 {
                return None;
            }
            let (int_part, frac_part) = compact.split_once(decimal)?;
            if frac_part.contains(thousands) || !valid_groups(int_part, thousands) {
                return None;
            }
            Some(format!("{}.{}", int_part.replace(thousands, ""), frac_part))
        }
    }
}

fn single_kind(compact: &str, sep: char, count: usize, convention: DecimalConvention) -> Option<String> {
    if count > 1 {
        // Only a grouping separator can repeat
        return valid_groups(compact, sep).then(|| compact.replace(sep, ""));
    }

    let (int_part, frac_part) = compact.split_once(sep)?;
    // A grouped number never starts with 0: "0.500" is half, not five hundred
    let is_thousands = frac_part.len() == 3
        && !int_part.is_empty()
        && !int_part.starts_with('0')
        && matches!(
            (convention, sep),
            (DecimalConvention::CommaDecimal, '.') | (DecimalConvention::DotDecimal, ',')
        );

    if is_thousands {
        Some(format!("{}{}", int_part, frac_part))
    } else {
        Some(format!("{}.{}", int_part, frac_part))
    }
}

/// Check `1.234.567`-style grouping: 1-3 leading digits, then groups of 3.
fn valid_groups(s: &str, sep: char) -> bool {
    let mut groups = s.split(sep);
    let first_ok = groups
        .next()
        .is_some_and(|g| !g.is_empty() && g.len() <= 3 && !g.starts_with('0'));
    first_ok && groups.all(|g| g.len() == 3) || !s.contains(sep)
}
