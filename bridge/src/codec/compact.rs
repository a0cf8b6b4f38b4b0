use num_bigint::BigUint;
use num_traits::Zero;

use super::CodecError;

/// Symbols of the generic compactor, lowest value first.
pub const ALPHABET: &[u8; 39] = b"0123456789abcdefghijklmnopqrstuvwxyz:/.";

pub const RADIX: u32 = 39;

pub const COMPOUND_DELIMITER: char = '/';

pub(crate) fn symbol_value(c: char) -> Option<u32> {
    ALPHABET
        .iter()
        .position(|&symbol| symbol as char == c)
        .map(|i| i as u32)
}

/// Evaluates `s` as a radix-39 numeral, most significant symbol first.
///
/// Characters outside [`ALPHABET`] are skipped rather than rejected. Composite
/// identifiers built elsewhere rely on that, so it must stay lenient.
pub fn string_to_int(s: &str) -> BigUint {
    s.chars()
        .filter_map(symbol_value)
        .fold(BigUint::zero(), |acc, digit| acc * RADIX + digit)
}

/// Emits the radix-39 numeral for `n`. Zero is the single symbol `"0"`.
pub fn int_to_string(n: &BigUint) -> String {
    n.to_radix_be(RADIX)
        .into_iter()
        .map(|digit| ALPHABET[digit as usize] as char)
        .collect()
}

/// Joins `a` and `b` with `/` and compacts the result.
pub fn encode_compound(a: &str, b: &str) -> BigUint {
    string_to_int(&format!("{a}{COMPOUND_DELIMITER}{b}"))
}

/// Splits a compacted `a/b` back into its two halves.
pub fn decode_compound(id: &BigUint) -> Result<(String, String), CodecError> {
    let joined = int_to_string(id);
    joined
        .split_once(COMPOUND_DELIMITER)
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or(CodecError::CorruptCompound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_the_first_symbol() {
        assert_eq!(int_to_string(&BigUint::zero()), "0");
        assert_eq!(string_to_int(""), BigUint::zero());
    }

    #[test]
    fn single_symbols_map_to_their_position() {
        assert_eq!(string_to_int("9"), BigUint::from(9u32));
        assert_eq!(string_to_int("a"), BigUint::from(10u32));
        assert_eq!(string_to_int("."), BigUint::from(38u32));
        assert_eq!(string_to_int("10"), BigUint::from(39u32));
    }

    #[test]
    fn round_trips_alphabet_strings() {
        for s in [
            "did:plc:z72i7hdynmk6r22z27h6tvur",
            "app.bsky.feed.post",
            "3jzfcijpj2z2a",
            "a/b/c",
            "did:web:example.com",
        ] {
            assert_eq!(int_to_string(&string_to_int(s)), s);
        }
    }

    #[test]
    fn unknown_characters_are_skipped_not_rejected() {
        // Documented contract: composite formats embed arbitrary characters.
        assert_eq!(string_to_int("A-b_C"), string_to_int("b"));
        assert_eq!(string_to_int("did:plc:ABC123"), string_to_int("did:plc:123"));
        assert_eq!(string_to_int("🦋"), BigUint::zero());
    }

    #[test]
    fn leading_zero_symbols_carry_no_value() {
        assert_eq!(string_to_int("007"), string_to_int("7"));
        assert_eq!(int_to_string(&string_to_int("007")), "7");
    }

    #[test]
    fn values_past_u64_are_supported() {
        let long = "did:plc:ewvi7nxzyoun6zhxrhs64oiz/3kxyzq7mzbn2c";
        let n = string_to_int(long);
        assert!(n.bits() > 64);
        assert_eq!(int_to_string(&n), long);
    }

    #[test]
    fn compound_round_trip() {
        let pairs = [
            ("did:plc:abcdefg", "3kabcxyz2fj2c"),
            ("did:web:example.com", "self"),
            ("x", ""),
            ("", "y"),
        ];
        for (a, b) in pairs {
            let id = encode_compound(a, b);
            assert_eq!(decode_compound(&id), Ok((a.to_string(), b.to_string())));
        }
    }

    #[test]
    fn compound_splits_on_first_delimiter() {
        let id = string_to_int("a/b/c");
        assert_eq!(
            decode_compound(&id),
            Ok(("a".to_string(), "b/c".to_string()))
        );
    }

    #[test]
    fn compound_without_delimiter_is_corrupt() {
        let id = string_to_int("nodelimiter");
        assert_eq!(decode_compound(&id), Err(CodecError::CorruptCompound));
        assert_eq!(
            decode_compound(&BigUint::zero()),
            Err(CodecError::CorruptCompound)
        );
    }
}
