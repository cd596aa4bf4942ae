//! LEB128 variable-length unsigned integers.

/// Why a varint could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// The buffer ended in the middle of the varint.
    Truncated,
    /// The varint encodes a value wider than 64 bits.
    Overflow,
}

/// Append `value` to `buf`.
pub fn encode(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a varint from `buf` starting at `*pos`, advancing `*pos` past it.
///
/// `*pos` is left untouched on error.
pub fn decode(buf: &[u8], pos: &mut usize) -> Result<u64, VarintError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut at = *pos;
    loop {
        let byte = *buf.get(at).ok_or(VarintError::Truncated)?;
        at += 1;

        let payload = (byte & 0x7f) as u64;
        // the tenth byte may only contribute the top bit
        if (shift == 63 && payload > 1) || shift > 63 {
            return Err(VarintError::Overflow);
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            *pos = at;
            return Ok(result);
        }
        shift += 7;
    }
}

/// Number of bytes [encode] emits for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, encoded_len, VarintError};

    #[test]
    fn boundaries() {
        for (value, len) in [
            (0, 1),
            (1, 1),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (u32::MAX as u64, 5),
            (u64::MAX, 10),
        ] {
            let mut buf = vec![];
            encode(value, &mut buf);
            assert_eq!(len, buf.len(), "{value}");
            assert_eq!(len, encoded_len(value), "{value}");

            let mut pos = 0;
            assert_eq!(Ok(value), decode(&buf, &mut pos));
            assert_eq!(buf.len(), pos);
        }
    }

    #[test]
    fn several_in_one_buffer() {
        let mut buf = vec![];
        encode(100, &mut buf);
        encode(300, &mut buf);

        let mut pos = 0;
        assert_eq!(Ok(100), decode(&buf, &mut pos));
        assert_eq!(Ok(300), decode(&buf, &mut pos));
        assert_eq!(buf.len(), pos);
    }

    #[test]
    fn truncated() {
        let mut pos = 0;
        assert_eq!(Err(VarintError::Truncated), decode(&[], &mut pos));
        assert_eq!(Err(VarintError::Truncated), decode(&[0x80, 0x80], &mut pos));
        assert_eq!(0, pos);
    }

    #[test]
    fn overflow() {
        let mut pos = 0;
        let mut eleven = vec![0xff; 10];
        eleven.push(0x01);
        assert_eq!(Err(VarintError::Overflow), decode(&eleven, &mut pos));

        let mut too_wide = vec![0xff; 9];
        too_wide.push(0x02);
        assert_eq!(Err(VarintError::Overflow), decode(&too_wide, &mut pos));
    }
}
