use std::ops::Bound;
use std::sync::Arc;

use bytes::BufMut;
use pgmap_core::io::BufExt;
use pgmap_core::{DecodeError, EncodeError};

use crate::handler::TypeHandler;
use crate::type_info::PgType;
use crate::value::{PgRange, PgValue};

bitflags::bitflags! {
    // https://github.com/postgres/postgres/blob/master/src/include/utils/rangetypes.h
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct RangeFlags: u8 {
        const EMPTY = 0x01;
        const LB_INC = 0x02;
        const UB_INC = 0x04;
        const LB_INF = 0x08;
        const UB_INF = 0x10;
        const LB_NULL = 0x20;
        const UB_NULL = 0x40;
        const CONTAIN_EMPTY = 0x80;
    }
}

/// Handler for range types, parameterized by the subtype's handler.
///
/// Binary layout: a flags byte, then each finite bound as a length-prefixed subtype
/// value.
#[derive(Debug, Clone)]
pub struct RangeHandler {
    pg_type: Arc<PgType>,
    subtype: Arc<dyn TypeHandler>,
}

impl RangeHandler {
    pub fn new(pg_type: Arc<PgType>, subtype: Arc<dyn TypeHandler>) -> Self {
        RangeHandler { pg_type, subtype }
    }

    pub fn subtype_handler(&self) -> &Arc<dyn TypeHandler> {
        &self.subtype
    }

    fn read_bound(
        &self,
        buf: &mut &[u8],
        flags: RangeFlags,
        infinite: RangeFlags,
        inclusive: RangeFlags,
    ) -> Result<Bound<PgValue>, DecodeError> {
        if flags.contains(infinite) {
            return Ok(Bound::Unbounded);
        }

        let len = buf.read_i32()?;
        let len = usize::try_from(len).map_err(|_| {
            DecodeError::malformed(self.pg_type.name(), format!("invalid bound length: {len}"))
        })?;
        let value = self.subtype.read(buf, len)?;

        Ok(if flags.contains(inclusive) {
            Bound::Included(value)
        } else {
            Bound::Excluded(value)
        })
    }
}

impl TypeHandler for RangeHandler {
    fn pg_type(&self) -> &Arc<PgType> {
        &self.pg_type
    }

    fn native_type(&self) -> &'static str {
        "PgRange"
    }

    fn accepts(&self, value: &PgValue) -> bool {
        matches!(value, PgValue::Range(_))
    }

    fn decode(&self, buf: &mut &[u8]) -> Result<PgValue, DecodeError> {
        let flags = RangeFlags::from_bits_truncate(buf.read_u8()?);

        if flags.contains(RangeFlags::EMPTY) {
            return Ok(PgValue::Range(PgRange::Empty));
        }

        let start = self.read_bound(buf, flags, RangeFlags::LB_INF, RangeFlags::LB_INC)?;
        let end = self.read_bound(buf, flags, RangeFlags::UB_INF, RangeFlags::UB_INC)?;

        Ok(PgValue::Range(PgRange::new(start, end)))
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let PgValue::Range(range) = value else {
            return Err(self.unsupported(value));
        };

        let (start, end) = match range {
            PgRange::Empty => {
                buf.put_u8(RangeFlags::EMPTY.bits());
                return Ok(());
            }
            PgRange::Bounded { start, end } => (start, end),
        };

        let mut flags = match start {
            Bound::Included(_) => RangeFlags::LB_INC,
            Bound::Excluded(_) => RangeFlags::empty(),
            Bound::Unbounded => RangeFlags::LB_INF,
        };

        flags |= match end {
            Bound::Included(_) => RangeFlags::UB_INC,
            Bound::Excluded(_) => RangeFlags::empty(),
            Bound::Unbounded => RangeFlags::UB_INF,
        };

        buf.put_u8(flags.bits());

        for bound in [start, end] {
            if let Bound::Included(value) | Bound::Excluded(value) = bound {
                if value.is_null() {
                    return Err(EncodeError::UnexpectedNull {
                        type_name: self.pg_type.name().to_owned(),
                    });
                }

                self.subtype.write_prefixed(value, buf)?;
            }
        }

        Ok(())
    }
}
