//! Human-readable formatting of raw 18-decimal amounts.

use crowdsale_types::{TokenAmount, Wei, WEI_PER_ETHER};

/// `1_500_000_000_000_000_000` → `"1.5"`. Trailing zeros are trimmed.
pub fn format_units(raw: u128) -> String {
    let whole = raw / WEI_PER_ETHER;
    let frac = raw % WEI_PER_ETHER;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:018}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

pub fn format_wei(wei: Wei) -> String {
    format!("{} ether", format_units(wei.raw()))
}

pub fn format_tokens(tokens: TokenAmount) -> String {
    format!("{} tokens", format_units(tokens.raw()))
}
