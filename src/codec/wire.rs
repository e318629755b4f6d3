//! Primitive encodings shared by type definitions and values.
//!
//! Unsigned integers below 128 are a single byte.  Larger values are the
//! minimal big-endian byte string preceded by its length, negated.  Signed
//! integers fold the sign into bit 0 (complemented when negative) and are
//! then sent as unsigned.

use super::DecodeError;

pub fn put_uint(buf: &mut Vec<u8>, x: u64) {
    if x < 0x80 {
        buf.push(x as u8);
        return;
    }
    let be = x.to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count();
    let n = be.len() - skip;
    buf.push((n as u8).wrapping_neg());
    buf.extend_from_slice(&be[skip..]);
}

pub fn put_int(buf: &mut Vec<u8>, i: i64) {
    let u = if i < 0 {
        ((!i as u64) << 1) | 1
    } else {
        (i as u64) << 1
    };
    put_uint(buf, u);
}

pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_uint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

/// Cursor over an in-memory buffer.  Every read is bounds-checked.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len()).ok_or(
            DecodeError::Truncated { needed: n, offset: self.pos },
        )?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn uint(&mut self) -> Result<u64, DecodeError> {
        let first = self.take(1)?[0];
        if first < 0x80 {
            return Ok(first as u64);
        }
        let n = first.wrapping_neg() as usize;
        if n == 0 || n > 8 {
            return Err(DecodeError::BadUint { offset: self.pos - 1, prefix: first });
        }
        let bytes = self.take(n)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn int(&mut self) -> Result<i64, DecodeError> {
        let u = self.uint()?;
        if u & 1 == 1 {
            Ok(!(u >> 1) as i64)
        } else {
            Ok((u >> 1) as i64)
        }
    }

    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.uint()? != 0)
    }

    /// Floats travel as the byte-reversed IEEE-754 bit pattern.
    pub fn float(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.uint()?.swap_bytes()))
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.uint()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated {
            needed: usize::MAX,
            offset: self.pos,
        })?;
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String, DecodeError> {
        let offset = self.pos;
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_layout() {
        let mut buf = Vec::new();
        put_uint(&mut buf, 0);
        put_uint(&mut buf, 7);
        put_uint(&mut buf, 256);
        assert_eq!(buf, [0x00, 0x07, 0xFE, 0x01, 0x00]);
    }

    #[test]
    fn int_layout() {
        let mut buf = Vec::new();
        put_int(&mut buf, 65);
        put_int(&mut buf, -65);
        put_int(&mut buf, -1);
        assert_eq!(buf, [0xFF, 0x82, 0xFF, 0x81, 0x01]);

        let mut r = Reader::new(&buf);
        assert_eq!(r.int().unwrap(), 65);
        assert_eq!(r.int().unwrap(), -65);
        assert_eq!(r.int().unwrap(), -1);
        assert!(r.is_empty());
    }

    #[test]
    fn extremes() {
        let mut buf = Vec::new();
        put_uint(&mut buf, u64::MAX);
        put_int(&mut buf, i64::MIN);
        put_int(&mut buf, i64::MAX);
        let mut r = Reader::new(&buf);
        assert_eq!(r.uint().unwrap(), u64::MAX);
        assert_eq!(r.int().unwrap(), i64::MIN);
        assert_eq!(r.int().unwrap(), i64::MAX);
    }

    #[test]
    fn oversized_prefix_rejected() {
        // 0xF7 claims nine bytes.
        let mut r = Reader::new(&[0xF7, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(matches!(r.uint(), Err(DecodeError::BadUint { .. })));
    }

    #[test]
    fn short_string() {
        let mut r = Reader::new(&[0x05, b'a', b'b']);
        assert!(matches!(r.string(), Err(DecodeError::Truncated { .. })));
    }
}
