// Versioned tagged binary encoding for serialized (structured) field values.
use serde_json::{Map, Number, Value};

use crate::core::error::{Error, ErrorKind};

pub const BLOB_MAGIC: [u8; 4] = *b"CMB1";
pub const BLOB_VERSION: u8 = 1;
pub const BLOB_HEADER_LEN: usize = 5;
pub const MAX_DEPTH: usize = 128;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_I64: u8 = 3;
const TAG_U64: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_OBJECT: u8 = 8;

pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&BLOB_MAGIC);
    buf.push(BLOB_VERSION);
    encode_node(&mut buf, value, 0)?;
    Ok(buf)
}

pub fn decode(buf: &[u8]) -> Result<Value, Error> {
    if buf.len() < BLOB_HEADER_LEN {
        return Err(Error::new(ErrorKind::Corrupt).with_message("blob header too small"));
    }
    if buf[0..4] != BLOB_MAGIC {
        return Err(Error::new(ErrorKind::Corrupt).with_message("bad blob magic"));
    }
    if buf[4] != BLOB_VERSION {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!("unsupported blob version {}", buf[4])));
    }
    let mut reader = Reader {
        buf,
        pos: BLOB_HEADER_LEN,
    };
    let value = reader.node(0)?;
    if reader.pos != buf.len() {
        return Err(Error::new(ErrorKind::Corrupt).with_message("trailing bytes after blob"));
    }
    Ok(value)
}

fn encode_node(buf: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), Error> {
    if depth > MAX_DEPTH {
        return Err(Error::new(ErrorKind::UnmappableType).with_message("blob nesting too deep"));
    }
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(false) => buf.push(TAG_FALSE),
        Value::Bool(true) => buf.push(TAG_TRUE),
        Value::Number(number) => encode_number(buf, number)?,
        Value::String(text) => {
            buf.push(TAG_STRING);
            write_str(buf, text)?;
        }
        Value::Array(items) => {
            buf.push(TAG_ARRAY);
            write_len(buf, items.len())?;
            for item in items {
                encode_node(buf, item, depth + 1)?;
            }
        }
        Value::Object(map) => {
            buf.push(TAG_OBJECT);
            write_len(buf, map.len())?;
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                write_str(buf, key)?;
                encode_node(buf, item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn encode_number(buf: &mut Vec<u8>, number: &Number) -> Result<(), Error> {
    if let Some(value) = number.as_i64() {
        buf.push(TAG_I64);
        buf.extend_from_slice(&value.to_le_bytes());
    } else if let Some(value) = number.as_u64() {
        buf.push(TAG_U64);
        buf.extend_from_slice(&value.to_le_bytes());
    } else if let Some(value) = number.as_f64() {
        buf.push(TAG_F64);
        buf.extend_from_slice(&value.to_bits().to_le_bytes());
    } else {
        return Err(Error::new(ErrorKind::UnmappableType).with_message("unsupported number"));
    }
    Ok(())
}

fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<(), Error> {
    let len = u32::try_from(len)
        .map_err(|_| Error::new(ErrorKind::UnmappableType).with_message("blob length exceeds u32"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_str(buf: &mut Vec<u8>, text: &str) -> Result<(), Error> {
    write_len(buf, text.len())?;
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn node(&mut self, depth: usize) -> Result<Value, Error> {
        if depth > MAX_DEPTH {
            return Err(Error::new(ErrorKind::Corrupt).with_message("blob nesting too deep"));
        }
        let tag = self.take(1)?[0];
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_I64 => Ok(Value::from(i64::from_le_bytes(self.read_8()?))),
            TAG_U64 => Ok(Value::from(u64::from_le_bytes(self.read_8()?))),
            TAG_F64 => {
                let value = f64::from_bits(u64::from_le_bytes(self.read_8()?));
                Number::from_f64(value)
                    .map(Value::Number)
                    .ok_or_else(|| Error::new(ErrorKind::Corrupt).with_message("non-finite float"))
            }
            TAG_STRING => self.string().map(Value::String),
            TAG_ARRAY => {
                let count = self.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.node(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            TAG_OBJECT => {
                let count = self.read_u32()? as usize;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = self.string()?;
                    let item = self.node(depth + 1)?;
                    map.insert(key, item);
                }
                Ok(Value::Object(map))
            }
            other => Err(Error::new(ErrorKind::Corrupt).with_message(format!("unknown blob tag {other}"))),
        }
    }

    fn string(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid utf-8 in blob")
                .with_source(err)
        })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::new(ErrorKind::Corrupt).with_message("blob truncated"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(out))
    }

    fn read_8(&mut self) -> Result<[u8; 8], Error> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }
}
