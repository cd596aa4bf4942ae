//! A base-85 encoding whose output can be pasted verbatim into string
//! literals.
//!
//! Input is processed in groups of four bytes, each read as a
//! big-endian `u32` and written as five symbols, most significant
//! first. A trailing group of `r` bytes is zero-padded, and only its
//! first `r + 1` symbols are written. There is no padding character.
//! Decoding pads a short final group with the highest symbol (`~`),
//! which restores the dropped low-order bytes.
//!
//! The alphabet is the printable ASCII range without the characters
//! that delimit, escape or interpolate inside Ruby, shell and Rust
//! string literals: `"`, `#`, `$`, `'`, `@`, `\`, `` ` ``, `{` and `}`.
//! Symbol values increase with the character code.

use thiserror::Error;

pub const ALPHABET: &[u8; 85] =
    b"!%&()*+,-./0123456789:;<=>?ABCDEFGHIJKLMNOPQRSTUVWXYZ[]^_abcdefghijklmnopqrstuvwxyz|~";

const INVALID: u8 = 0xff;

/// Maps every byte to its symbol value, or [INVALID].
const DECODE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Errors that can occur while decoding radix-85 text.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum Radix85Error {
    #[error("symbol {symbol:#04x} at offset {offset} not in alphabet")]
    InvalidSymbol { symbol: u8, offset: usize },

    #[error("invalid length {len}: the final group has a single symbol")]
    InvalidLength { len: usize },

    #[error("group at offset {offset} does not fit into 32 bits")]
    Overflow { offset: usize },
}

/// Returns encoded input
pub fn encode(input: &[u8]) -> String {
    let mut output = String::with_capacity(encode_len(input.len()));

    for group in input.chunks(4) {
        let mut buf = [0u8; 4];
        buf[..group.len()].copy_from_slice(group);
        let mut value = u32::from_be_bytes(buf);

        let mut symbols = [0u8; 5];
        for symbol in symbols.iter_mut().rev() {
            *symbol = ALPHABET[(value % 85) as usize];
            value /= 85;
        }

        output.extend(symbols[..group.len() + 1].iter().map(|&c| c as char));
    }

    output
}

/// Returns decoded input
pub fn decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, Radix85Error> {
    let input = input.as_ref();
    if input.len() % 5 == 1 {
        return Err(Radix85Error::InvalidLength { len: input.len() });
    }

    let mut output = Vec::with_capacity(decode_len(input.len()));
    for (n, group) in input.chunks(5).enumerate() {
        let offset = n * 5;

        let mut value: u64 = 0;
        for i in 0..5 {
            let digit = match group.get(i) {
                Some(&symbol) => match DECODE[symbol as usize] {
                    INVALID => {
                        return Err(Radix85Error::InvalidSymbol {
                            symbol,
                            offset: offset + i,
                        })
                    }
                    digit => digit,
                },
                None => 84,
            };
            value = value * 85 + digit as u64;
        }

        let value = u32::try_from(value).map_err(|_| Radix85Error::Overflow { offset })?;
        output.extend_from_slice(&value.to_be_bytes()[..group.len() - 1]);
    }

    Ok(output)
}

/// Returns the encoded length of an input of length len
pub fn encode_len(len: usize) -> usize {
    match len % 4 {
        0 => len / 4 * 5,
        r => len / 4 * 5 + r + 1,
    }
}

/// Returns the decoded length of an input of length len.
///
/// Lengths which [decode] rejects map to the length of their longest
/// valid prefix.
pub fn decode_len(len: usize) -> usize {
    match len % 5 {
        0 | 1 => len / 5 * 4,
        r => len / 5 * 4 + r - 1,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Radix85Error, ALPHABET};

    #[rstest]
    #[case::empty(b"", "")]
    #[case::one_zero(&[0], "!!")]
    #[case::four_zeros(&[0; 4], "!!!!!")]
    #[case::four_ones(&[0xff; 4], "z<]1!")]
    #[case::space(b" ", "/=")]
    #[case::full_group(b"ABCD", "9zkx0")]
    #[case::two(b"AB", "9zi")]
    #[case::three(b"ABC", "9zkw")]
    #[case::group_and_one(b"ABCDE", "9zkx0;4")]
    #[case::group_and_two(b"ABCDEF", "9zkx0;;N")]
    #[case::group_and_three(b"ABCDEFG", "9zkx0;;Pj")]
    fn encode(#[case] dec: &[u8], #[case] enc: &str) {
        assert_eq!(enc, super::encode(dec));
        assert_eq!(enc.len(), super::encode_len(dec.len()));
    }

    #[rstest]
    #[case::empty("", &[])]
    #[case::one_zero("!!", &[0])]
    #[case::four_ones("z<]1!", &[0xff; 4])]
    #[case::two("9zi", b"AB")]
    #[case::three("9zkw", b"ABC")]
    #[case::group_and_one("9zkx0;4", b"ABCDE")]
    #[case::group_and_three("9zkx0;;Pj", b"ABCDEFG")]
    fn decode(#[case] enc: &str, #[case] dec: &[u8]) {
        assert_eq!(dec, super::decode(enc).unwrap());
        assert_eq!(dec.len(), super::decode_len(enc.len()));
    }

    #[rstest]
    #[case::double_quote("!!\"!!", 2)]
    #[case::backslash("\\!", 0)]
    #[case::hash("!!!!!!#", 6)]
    #[case::brace("!{", 1)]
    #[case::space("! ", 1)]
    #[case::high_byte("!\u{e9}", 1)]
    fn invalid_symbol(#[case] enc: &str, #[case] offset: usize) {
        let symbol = enc.as_bytes()[offset];
        assert_eq!(
            Err(Radix85Error::InvalidSymbol { symbol, offset }),
            super::decode(enc)
        );
    }

    #[rstest]
    #[case(1)]
    #[case(6)]
    #[case(11)]
    fn invalid_length(#[case] len: usize) {
        let enc = "!".repeat(len);
        assert_eq!(
            Err(Radix85Error::InvalidLength { len }),
            super::decode(enc)
        );
    }

    #[test]
    fn overflow() {
        assert_eq!(
            Err(Radix85Error::Overflow { offset: 5 }),
            super::decode("!!!!!~~~~~")
        );
        // the largest group that still fits
        assert_eq!(vec![0xff; 4], super::decode("z<]1!").unwrap());
        assert!(super::decode("z<]1%").is_err());
    }

    #[test]
    fn alphabet_is_embedding_safe() {
        for forbidden in b"\"#$'@\\`{} \t\n" {
            assert!(!ALPHABET.contains(forbidden), "{}", *forbidden as char);
        }
        assert!(ALPHABET.windows(2).all(|w| w[0] < w[1]));
        assert!(ALPHABET.iter().all(|c| c.is_ascii_graphic()));
    }
}
