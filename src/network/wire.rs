use super::error::WireError;

/// Byte buffer with a read offset. Writes always append at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCursor {
    buf: Vec<u8>,
    offset: usize,
}

impl From<Vec<u8>> for ByteCursor {
    fn from(buf: Vec<u8>) -> Self {
        Self { buf, offset: 0 }
    }
}
impl From<&[u8]> for ByteCursor {
    fn from(buf: &[u8]) -> Self {
        buf.to_vec().into()
    }
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.buf.len()
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn get(&mut self, len: usize) -> Result<&[u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::OutOfBounds { needed: len, remaining: self.remaining() });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.buf[start..self.offset])
    }
    /// Consumes everything from the offset to the end of the buffer.
    pub fn get_remaining(&mut self) -> Vec<u8> {
        let rest = self.buf[self.offset..].to_vec();
        self.offset = self.buf.len();
        rest
    }
    pub fn put(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.get(1)?[0])
    }
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    pub fn get_i8(&mut self) -> Result<i8, WireError> {
        Ok(self.get_u8()? as i8)
    }
    pub fn put_i8(&mut self, v: i8) {
        self.put_u8(v as u8)
    }
    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.get_u8()? != 0)
    }
    pub fn put_bool(&mut self, v: bool) {
        self.put_u8(v as u8)
    }
}

macro_rules! fixed {
    { $($t:ident: $get_be:ident $put_be:ident $get_le:ident $put_le:ident;)* } => {
        impl ByteCursor {
            $(
                pub fn $get_be(&mut self) -> Result<$t, WireError> {
                    let mut raw = [0; core::mem::size_of::<$t>()];
                    let len = raw.len();
                    raw.copy_from_slice(self.get(len)?);
                    Ok($t::from_be_bytes(raw))
                }
                pub fn $put_be(&mut self, v: $t) {
                    self.put(&v.to_be_bytes())
                }
                pub fn $get_le(&mut self) -> Result<$t, WireError> {
                    let mut raw = [0; core::mem::size_of::<$t>()];
                    let len = raw.len();
                    raw.copy_from_slice(self.get(len)?);
                    Ok($t::from_le_bytes(raw))
                }
                pub fn $put_le(&mut self, v: $t) {
                    self.put(&v.to_le_bytes())
                }
            )*
        }
    }
}
fixed! {
    u16: get_u16 put_u16 get_u16_le put_u16_le;
    i16: get_i16 put_i16 get_i16_le put_i16_le;
    u32: get_u32 put_u32 get_u32_le put_u32_le;
    i32: get_i32 put_i32 get_i32_le put_i32_le;
    u64: get_u64 put_u64 get_u64_le put_u64_le;
    i64: get_i64 put_i64 get_i64_le put_i64_le;
    f32: get_f32 put_f32 get_f32_le put_f32_le;
    f64: get_f64 put_f64 get_f64_le put_f64_le;
}

const CONTINUE_BIT: u8 = 0b1000_0000;

impl ByteCursor {
    fn get_varint_raw(&mut self, max_bytes: usize) -> Result<u64, WireError> {
        let mut n = 0u64;
        for i in 0..max_bytes {
            let b = self.get_u8()?;
            n |= ((b & !CONTINUE_BIT) as u64) << (7 * i);
            if b & CONTINUE_BIT == 0 {
                return Ok(n);
            }
        }
        Err(WireError::VarIntTooLong { max: max_bytes })
    }
    fn put_varint_raw(&mut self, mut n: u64) {
        while n & !((!CONTINUE_BIT) as u64) != 0 {
            self.put_u8(n as u8 & !CONTINUE_BIT | CONTINUE_BIT);
            n >>= 7;
        }
        self.put_u8(n as u8);
    }

    pub fn get_unsigned_var_int(&mut self) -> Result<u32, WireError> {
        self.get_varint_raw(5).map(|n| n as u32)
    }
    pub fn put_unsigned_var_int(&mut self, v: u32) {
        self.put_varint_raw(v as u64)
    }
    pub fn get_unsigned_var_long(&mut self) -> Result<u64, WireError> {
        self.get_varint_raw(10)
    }
    pub fn put_unsigned_var_long(&mut self, v: u64) {
        self.put_varint_raw(v)
    }
    /// Zigzag-encoded signed 32-bit varint.
    pub fn get_var_int(&mut self) -> Result<i32, WireError> {
        let n = self.get_unsigned_var_int()?;
        Ok((n >> 1) as i32 ^ -((n & 1) as i32))
    }
    pub fn put_var_int(&mut self, v: i32) {
        self.put_unsigned_var_int(((v << 1) ^ (v >> 31)) as u32)
    }
    /// Zigzag-encoded signed 64-bit varint.
    pub fn get_var_long(&mut self) -> Result<i64, WireError> {
        let n = self.get_unsigned_var_long()?;
        Ok((n >> 1) as i64 ^ -((n & 1) as i64))
    }
    pub fn put_var_long(&mut self, v: i64) {
        self.put_unsigned_var_long(((v << 1) ^ (v >> 63)) as u64)
    }

    pub fn get_byte_string(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.get_unsigned_var_int()? as usize;
        Ok(self.get(len)?.to_vec())
    }
    pub fn put_byte_string(&mut self, v: &[u8]) {
        self.put_unsigned_var_int(v.len() as u32);
        self.put(v);
    }
    pub fn get_string(&mut self) -> Result<String, WireError> {
        String::from_utf8(self.get_byte_string()?).map_err(|_| WireError::InvalidUtf8)
    }
    pub fn put_string(&mut self, v: &str) {
        self.put_byte_string(v.as_bytes())
    }
}

/// A value with a single fixed wire representation.
pub trait Wire: Sized {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError>;
    fn encode(&self, cur: &mut ByteCursor);
}

/// Selects the unsigned varint encoding for a field.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct var<T>(pub T);
/// Selects the zigzag varint encoding for a field.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct zigzag<T>(pub T);

impl Wire for var<u32> {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_unsigned_var_int().map(Self)
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_unsigned_var_int(self.0)
    }
}
impl Wire for var<u64> {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_unsigned_var_long().map(Self)
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_unsigned_var_long(self.0)
    }
}
impl Wire for zigzag<i32> {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_var_int().map(Self)
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_var_int(self.0)
    }
}
impl Wire for zigzag<i64> {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_var_long().map(Self)
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_var_long(self.0)
    }
}
impl Wire for u8 {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_u8()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_u8(*self)
    }
}
impl Wire for bool {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_bool()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_bool(*self)
    }
}
impl Wire for String {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_string()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_string(self)
    }
}
/// Little-endian, as everywhere in this protocol outside of varints.
impl Wire for i16 {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_i16_le()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_i16_le(*self)
    }
}
impl Wire for f32 {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        cur.get_f32_le()
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_f32_le(*self)
    }
}
/// Unsigned-varint count followed by the elements.
impl<T: Wire> Wire for Vec<T> {
    fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
        let len = cur.get_unsigned_var_int()? as usize;
        // every element takes at least one byte
        let mut out = Vec::with_capacity(len.min(cur.remaining()));
        for _ in 0..len {
            out.push(T::decode(cur)?);
        }
        Ok(out)
    }
    fn encode(&self, cur: &mut ByteCursor) {
        cur.put_unsigned_var_int(self.len() as u32);
        for v in self {
            v.encode(cur);
        }
    }
}

macro_rules! impl_wire {
    {} => {};
    {$t:ident $($rt:ident)*} => {
        #[allow(non_snake_case)]
        impl<$t: Wire, $($rt: Wire),*> Wire for ($t, $($rt,)*) {
            fn decode(cur: &mut ByteCursor) -> Result<Self, WireError> {
                let $t = $t::decode(cur)?;
                $(let $rt = $rt::decode(cur)?;)*
                Ok(($t, $($rt,)*))
            }
            fn encode(&self, cur: &mut ByteCursor) {
                let ($t, $($rt,)*) = self;
                $t.encode(cur);
                $($rt.encode(cur);)*
            }
        }
        impl_wire!($($rt)*);
    }
}
impl_wire!(A B C D E F);
