use bytes::Buf;

use crate::error::DecodeError;

/// Bounds-checked big-endian reads over a borrowed byte window.
///
/// Every read validates the remaining length first and reports a short window as
/// [`DecodeError::UnexpectedEof`] instead of panicking.
pub trait BufExt<'a>: Buf {
    fn ensure(&self, needed: usize) -> Result<(), DecodeError>;

    /// Fails unless exactly `expected` bytes remain.
    fn expect_len(&self, expected: usize) -> Result<(), DecodeError>;

    fn read_u8(&mut self) -> Result<u8, DecodeError>;

    fn read_i8(&mut self) -> Result<i8, DecodeError>;

    fn read_i16(&mut self) -> Result<i16, DecodeError>;

    fn read_i32(&mut self) -> Result<i32, DecodeError>;

    fn read_u32(&mut self) -> Result<u32, DecodeError>;

    fn read_i64(&mut self) -> Result<i64, DecodeError>;

    fn read_f32(&mut self) -> Result<f32, DecodeError>;

    fn read_f64(&mut self) -> Result<f64, DecodeError>;

    /// Splits off the next `n` bytes without copying.
    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError>;
}

macro_rules! checked_get {
    ($name:ident, $get:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty, DecodeError> {
            self.ensure(std::mem::size_of::<$ty>())?;
            Ok(self.$get())
        }
    };
}

impl<'a> BufExt<'a> for &'a [u8] {
    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.len() < needed {
            return Err(DecodeError::UnexpectedEof {
                needed,
                remaining: self.len(),
            });
        }

        Ok(())
    }

    fn expect_len(&self, expected: usize) -> Result<(), DecodeError> {
        if self.len() != expected {
            return Err(DecodeError::LengthMismatch {
                expected,
                actual: self.len(),
            });
        }

        Ok(())
    }

    checked_get!(read_u8, get_u8, u8);
    checked_get!(read_i8, get_i8, i8);
    checked_get!(read_i16, get_i16, i16);
    checked_get!(read_i32, get_i32, i32);
    checked_get!(read_u32, get_u32, u32);
    checked_get!(read_i64, get_i64, i64);
    checked_get!(read_f32, get_f32, f32);
    checked_get!(read_f64, get_f64, f64);

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(n)?;

        let (head, tail) = (*self).split_at(n);
        *self = tail;

        Ok(head)
    }
}
