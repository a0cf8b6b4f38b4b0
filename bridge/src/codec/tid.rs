use super::CodecError;

/// Base32-sortable alphabet used by record keys.
pub const TID_ALPHABET: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";

pub const TID_LEN: usize = 13;

const TOP_BIT: u64 = 1 << 63;
const CLOCK_ID_BITS: u32 = 10;

fn tid_symbol_value(c: char) -> Option<u64> {
    TID_ALPHABET
        .iter()
        .position(|&symbol| symbol as char == c)
        .map(|i| i as u64)
}

/// Decodes a 13-character TID into the 63-bit value it carries.
pub fn tid_to_number(tid: &str) -> Result<u64, CodecError> {
    let len = tid.chars().count();
    if len != TID_LEN {
        return Err(CodecError::TidLength(len));
    }

    // 13 symbols hold 65 bits, so accumulate wide and narrow afterwards.
    let mut value: u128 = 0;
    for c in tid.chars() {
        let digit = tid_symbol_value(c).ok_or(CodecError::TidCharacter(c))?;
        value = (value << 5) | u128::from(digit);
    }

    u64::try_from(value)
        .ok()
        .filter(|v| v & TOP_BIT == 0)
        .ok_or(CodecError::TopBitSet)
}

/// Encodes a 63-bit value as exactly 13 TID symbols, most significant first.
pub fn number_to_tid(n: u64) -> Result<String, CodecError> {
    if n & TOP_BIT != 0 {
        return Err(CodecError::TopBitSet);
    }

    Ok((0..TID_LEN as u64)
        .rev()
        .map(|i| TID_ALPHABET[((n >> (5 * i)) & 0x1f) as usize] as char)
        .collect())
}

/// Builds a TID value from a microsecond timestamp and a 10-bit clock id.
pub fn tid_from_timestamp(micros: u64, clock_id: u16) -> Result<u64, CodecError> {
    if micros >> (63 - CLOCK_ID_BITS) != 0 {
        return Err(CodecError::TopBitSet);
    }
    Ok((micros << CLOCK_ID_BITS) | (u64::from(clock_id) & 0x3ff))
}

/// Microseconds since the epoch recorded in a TID value.
pub fn tid_timestamp(n: u64) -> u64 {
    (n & !TOP_BIT) >> CLOCK_ID_BITS
}

pub fn tid_clock_id(n: u64) -> u16 {
    (n & 0x3ff) as u16
}
