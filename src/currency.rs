//! Currency-code normalization for price-feed lookups and user messages.
//!
//! Ledger currencies arrive either as plain three-letter codes or as
//! 160-bit hex-encoded codes carrying arbitrary symbol text. Both forms are
//! mapped to one human-readable symbol here, with two extra rules: anything
//! impersonating the native asset is renamed to a sentinel, and known
//! stablecoin tickers collapse to one symbol per fiat peg.

use phf::phf_map;

/// The ledger's native asset symbol.
pub const NATIVE_CURRENCY: &str = "XRP";

/// Sentinel for issued currencies that impersonate the native asset.
pub const FAKE_NATIVE_CURRENCY: &str = "FakeXRP";

/// First byte of the 160-bit encoding that carries an 8-byte metadata header
/// before the UTF-8 symbol text.
const EXTENDED_METADATA_PREFIX: u8 = 0x02;

/// Known stablecoin tickers collapsed to one symbol per fiat peg.
///
/// Extending coverage means adding entries here; the decoding algorithm
/// never changes.
static STABLECOIN_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "USD" => "USD",
    "USDT" => "USD",
    "USDC" => "USD",
    "BUSD" => "USD",
    "TUSD" => "USD",
    "USDP" => "USD",
    "GUSD" => "USD",
    "EUR" => "EUR",
    "EURS" => "EUR",
    "EURT" => "EUR",
    "EUROC" => "EUR",
};

/// Map a ledger-native currency identifier to a human-readable symbol.
///
/// Pure and deterministic; applying it twice gives the same result as
/// applying it once.
pub fn normalize_currency_code(code: &str) -> String {
    if code == NATIVE_CURRENCY {
        return code.to_string();
    }
    if code.eq_ignore_ascii_case(NATIVE_CURRENCY) {
        return FAKE_NATIVE_CURRENCY.to_string();
    }

    let decoded = if is_hex_currency(code) {
        decode_hex_currency(code)
    } else {
        code.to_string()
    };

    let symbol = decoded.trim();
    if symbol.eq_ignore_ascii_case(NATIVE_CURRENCY) {
        return FAKE_NATIVE_CURRENCY.to_string();
    }

    match STABLECOIN_ALIASES.get(symbol) {
        Some(canonical) => canonical.to_string(),
        None => symbol.to_string(),
    }
}

fn is_hex_currency(code: &str) -> bool {
    code.len() == 40 && code.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode a 160-bit currency code to its embedded symbol text, falling back
/// to the raw hex string when the payload is not valid UTF-8.
fn decode_hex_currency(code: &str) -> String {
    let Ok(bytes) = hex::decode(code) else {
        return code.to_string();
    };

    let text_bytes = if bytes.first() == Some(&EXTENDED_METADATA_PREFIX) {
        &bytes[8.min(bytes.len())..]
    } else {
        &bytes[..]
    };

    match std::str::from_utf8(text_bytes) {
        Ok(text) => text
            .chars()
            .filter(|c| *c != '\0' && *c != '\n' && *c != '\r')
            .collect(),
        Err(_) => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_code(text: &str) -> String {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(20, 0);
        hex::encode_upper(bytes)
    }

    #[test]
    fn native_symbol_passes_through_exactly() {
        assert_eq!(normalize_currency_code("XRP"), "XRP");
    }

    #[test]
    fn case_variants_of_native_symbol_are_flagged() {
        assert_eq!(normalize_currency_code("xrp"), "FakeXRP");
        assert_eq!(normalize_currency_code("Xrp"), "FakeXRP");
        assert_eq!(normalize_currency_code("xRP"), "FakeXRP");
    }

    #[test]
    fn plain_codes_pass_through() {
        assert_eq!(normalize_currency_code("BTC"), "BTC");
        assert_eq!(normalize_currency_code("CNY"), "CNY");
    }

    #[test]
    fn standard_hex_codes_decode_to_text() {
        assert_eq!(normalize_currency_code(&hex_code("USD")), "USD");
        assert_eq!(normalize_currency_code(&hex_code("Grumpy")), "Grumpy");
    }

    #[test]
    fn extended_hex_codes_skip_the_metadata_header() {
        let mut bytes = vec![EXTENDED_METADATA_PREFIX];
        bytes.extend_from_slice(&[0u8; 7]);
        bytes.extend_from_slice(b"Moon");
        bytes.resize(20, 0);
        assert_eq!(normalize_currency_code(&hex::encode_upper(bytes)), "Moon");
    }

    #[test]
    fn invalid_utf8_falls_back_to_the_raw_code() {
        let mut bytes = vec![0xFFu8, 0xFE];
        bytes.resize(20, 0xFF);
        let code = hex::encode_upper(bytes);
        assert_eq!(normalize_currency_code(&code), code);
    }

    #[test]
    fn hidden_native_symbols_are_flagged() {
        for disguised in ["XRP", "xrp", "xRp", " XRP "] {
            let code = hex_code(disguised);
            assert_eq!(
                normalize_currency_code(&code),
                "FakeXRP",
                "disguised form {:?} slipped through",
                disguised
            );
        }
    }

    #[test]
    fn stablecoin_aliases_collapse_per_peg() {
        assert_eq!(normalize_currency_code("USDT"), "USD");
        assert_eq!(normalize_currency_code("USDC"), "USD");
        assert_eq!(normalize_currency_code("EURS"), "EUR");
        assert_eq!(normalize_currency_code(&hex_code("USDC")), "USD");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "XRP".to_string(),
            "xrp".to_string(),
            "BTC".to_string(),
            "USDT".to_string(),
            hex_code("USD"),
            hex_code("xrp"),
            hex_code("SomeLongToken"),
        ];
        for code in samples {
            let once = normalize_currency_code(&code);
            assert_eq!(normalize_currency_code(&once), once, "input {:?}", code);
        }
    }
}
