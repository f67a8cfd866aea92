use bytes::BufMut;

use crate::error::EncodeError;

pub trait BufMutExt: BufMut {
    /// Writes a value preceded by its 4-byte big-endian length.
    ///
    /// The prefix does not count itself. On error the buffer is put back to where it was.
    fn put_length_prefixed<F>(&mut self, write_contents: F) -> Result<usize, EncodeError>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), EncodeError>;

    /// Writes the `-1` length that stands for SQL `NULL`.
    fn put_null(&mut self);
}

impl BufMutExt for Vec<u8> {
    fn put_length_prefixed<F>(&mut self, write_contents: F) -> Result<usize, EncodeError>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), EncodeError>,
    {
        // reserve space to write the prefixed length
        let offset = self.len();
        self.extend(&[0; 4]);

        let size_result = write_contents(self).and_then(|_| {
            let size = self.len() - offset - 4;
            i32::try_from(size)
                .map(|len| (size, len))
                .map_err(|_| EncodeError::OutOfRange {
                    type_name: "value length".into(),
                    value: size.to_string(),
                })
        });

        match size_result {
            Ok((size, len)) => {
                self[offset..(offset + 4)].copy_from_slice(&len.to_be_bytes());
                Ok(size)
            }
            Err(e) => {
                self.truncate(offset);
                Err(e)
            }
        }
    }

    #[inline]
    fn put_null(&mut self) {
        self.put_i32(-1);
    }
}
