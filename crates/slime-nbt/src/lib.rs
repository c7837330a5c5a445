use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// Upper bound for pre-allocation when a length prefix comes from untrusted input.
const MAX_PREALLOCATION: usize = 4096;

/// Deepest list/compound nesting `read` accepts.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(HashMap<String, Tag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

fn read_length<R: Read>(reader: &mut R) -> io::Result<usize> {
    let length = reader.read_i32::<BigEndian>()?;
    if length < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Negative array length: {}", length),
        ));
    }
    Ok(length as usize)
}

impl Tag {
    pub fn get_type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    /// An empty compound, the usual root of a metadata tree.
    pub fn empty_compound() -> Tag {
        Tag::Compound(HashMap::new())
    }

    pub fn compound<I, K>(entries: I) -> Tag
    where
        I: IntoIterator<Item = (K, Tag)>,
        K: Into<String>,
    {
        Tag::Compound(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Decodes an uncompressed, named root tag and drops the name.
    ///
    /// Returns `None` when the bytes are not a well-formed tag tree; callers that
    /// treat metadata leniently use this instead of [`Tag::read`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Tag> {
        let mut cursor = Cursor::new(bytes);
        match Tag::read(&mut cursor) {
            Ok((_, Tag::End)) => None,
            Ok((_, tag)) => Some(tag),
            Err(_) => None,
        }
    }

    /// Encodes this tag as a root tag with an empty name.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, "")?;
        Ok(buffer)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<(String, Tag)> {
        Tag::read_named(reader, 0)
    }

    fn read_named<R: Read>(reader: &mut R, depth: usize) -> io::Result<(String, Tag)> {
        let type_id = reader.read_u8()?;
        if type_id == 0 {
            return Ok(("".to_owned(), Tag::End));
        }

        let name = read_string(reader)?;
        let tag = Tag::read_payload(reader, type_id, depth)?;
        Ok((name, tag))
    }

    fn read_payload<R: Read>(reader: &mut R, type_id: u8, depth: usize) -> io::Result<Tag> {
        if (type_id == 9 || type_id == 10) && depth >= MAX_DEPTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Tag nesting exceeds {} levels", MAX_DEPTH),
            ));
        }
        match type_id {
            0 => Ok(Tag::End),
            1 => Ok(Tag::Byte(reader.read_i8()?)),
            2 => Ok(Tag::Short(reader.read_i16::<BigEndian>()?)),
            3 => Ok(Tag::Int(reader.read_i32::<BigEndian>()?)),
            4 => Ok(Tag::Long(reader.read_i64::<BigEndian>()?)),
            5 => Ok(Tag::Float(reader.read_f32::<BigEndian>()?)),
            6 => Ok(Tag::Double(reader.read_f64::<BigEndian>()?)),
            7 => {
                let length = read_length(reader)?;
                let mut bytes = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    bytes.push(reader.read_i8()?);
                }
                Ok(Tag::ByteArray(bytes))
            }
            8 => read_string(reader).map(Tag::String),
            9 => {
                let list_type = reader.read_u8()?;
                let length = read_length(reader)?;
                if list_type == 0 && length > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Non-empty list of TAG_End",
                    ));
                }
                let mut list = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    list.push(Tag::read_payload(reader, list_type, depth + 1)?);
                }
                Ok(Tag::List(list))
            }
            10 => {
                let mut compound = HashMap::new();
                loop {
                    let (name, tag) = Tag::read_named(reader, depth + 1)?;
                    if let Tag::End = tag {
                        break;
                    }
                    compound.insert(name, tag);
                }
                Ok(Tag::Compound(compound))
            }
            11 => {
                let length = read_length(reader)?;
                let mut ints = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    ints.push(reader.read_i32::<BigEndian>()?);
                }
                Ok(Tag::IntArray(ints))
            }
            12 => {
                let length = read_length(reader)?;
                let mut longs = Vec::with_capacity(length.min(MAX_PREALLOCATION));
                for _ in 0..length {
                    longs.push(reader.read_i64::<BigEndian>()?);
                }
                Ok(Tag::LongArray(longs))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid tag type: {}", type_id),
            )),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> io::Result<()> {
        writer.write_u8(self.get_type_id())?;

        if !matches!(self, Tag::End) {
            write_string(writer, name)?;
        }

        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v),
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v),
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v),
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v),
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v),
            Tag::ByteArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &b in v {
                    writer.write_i8(b)?;
                }
                Ok(())
            }
            Tag::String(v) => write_string(writer, v),
            Tag::List(v) => {
                let element_type = v.first().map_or(0, Tag::get_type_id);
                if v.iter().any(|tag| tag.get_type_id() != element_type) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "List elements must share one tag type",
                    ));
                }
                writer.write_u8(element_type)?;
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for tag in v {
                    tag.write_payload(writer)?;
                }
                Ok(())
            }
            Tag::Compound(v) => {
                // Sorted so equal compounds always encode to equal bytes.
                let mut entries: Vec<_> = v.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (name, tag) in entries {
                    tag.write(writer, name)?;
                }
                Tag::End.write(writer, "")?;
                Ok(())
            }
            Tag::IntArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
                Ok(())
            }
            Tag::LongArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &l in v {
                    writer.write_i64::<BigEndian>(l)?;
                }
                Ok(())
            }
        }
    }

    /// Looks up a child when this tag is a compound.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.as_compound()?.get(key)
    }

    pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_compound(self) -> Option<HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Tag>> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&String> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Tag::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Tag::Float(n) => Some(*n),
            _ => None,
        }
    }
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let length = reader.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; length as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let length = u16::try_from(value.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("String too long for NBT: {} bytes", value.len()),
        )
    })?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_type_ids() {
        assert_eq!(Tag::End.get_type_id(), 0);
        assert_eq!(Tag::Byte(0).get_type_id(), 1);
        assert_eq!(Tag::Int(0).get_type_id(), 3);
        assert_eq!(Tag::String("".to_string()).get_type_id(), 8);
        assert_eq!(Tag::List(vec![]).get_type_id(), 9);
        assert_eq!(Tag::Compound(HashMap::new()).get_type_id(), 10);
        assert_eq!(Tag::LongArray(vec![]).get_type_id(), 12);
    }

    #[test]
    fn test_tag_as_methods() {
        let compound = Tag::compound([("test", Tag::Int(42))]);
        assert_eq!(compound.get("test"), Some(&Tag::Int(42)));
        assert!(Tag::Int(0).get("test").is_none());

        let list = Tag::List(vec![Tag::Int(1), Tag::Int(2)]);
        assert_eq!(list.as_list().unwrap().len(), 2);
        assert!(Tag::Int(0).as_list().is_none());

        assert_eq!(Tag::String("test".to_string()).as_string().unwrap(), "test");
        assert_eq!(Tag::Int(42).as_i32(), Some(42));
        assert_eq!(Tag::Long(42).as_i64(), Some(42));
        assert_eq!(Tag::Float(42.0).as_f32(), Some(42.0));
        assert_eq!(Tag::Double(42.0).as_f64(), Some(42.0));
    }

    #[test]
    fn test_compound_tag_read_write() {
        let tag = Tag::compound([
            ("Name", Tag::String("minecraft:oak_log".to_string())),
            (
                "Properties",
                Tag::compound([("axis", Tag::String("y".to_string()))]),
            ),
            ("heights", Tag::LongArray(vec![1, -2, 3])),
            ("list", Tag::List(vec![Tag::Double(1.5), Tag::Double(-2.0)])),
        ]);

        let mut buffer = Vec::new();
        tag.write(&mut buffer, "root").unwrap();

        let mut cursor = Cursor::new(buffer);
        let (name, read_tag) = Tag::read(&mut cursor).unwrap();

        assert_eq!(name, "root");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_from_bytes_drops_root_name() {
        let tag = Tag::compound([("x", Tag::Int(-1))]);
        let bytes = tag.to_bytes().unwrap();
        assert_eq!(Tag::from_bytes(&bytes), Some(tag));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert_eq!(Tag::from_bytes(&[]), None);
        assert_eq!(Tag::from_bytes(&[0]), None);
        assert_eq!(Tag::from_bytes(&[255, 0, 0]), None);
        // Truncated compound: type + empty name + an Int child without payload.
        assert_eq!(Tag::from_bytes(&[10, 0, 0, 3, 0, 1, b'x']), None);
    }

    #[test]
    fn test_negative_array_length_is_an_error() {
        let bytes = [11u8, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
        let result = Tag::read(&mut Cursor::new(bytes));
        assert!(result.is_err());
    }

    /// Root compound holding `levels` lists nested inside one another.
    fn nested_lists(levels: usize) -> Vec<u8> {
        let mut bytes = vec![10, 0, 0, 9, 0, 5];
        bytes.extend_from_slice(b"tiles");
        for _ in 0..levels - 1 {
            bytes.extend_from_slice(&[9, 0, 0, 0, 1]);
        }
        bytes.extend_from_slice(&[0, 0, 0, 0, 0]);
        bytes.push(0);
        bytes
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let bytes = nested_lists(200_000);
        let err = Tag::read(&mut Cursor::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(Tag::from_bytes(&bytes), None);
    }

    #[test]
    fn test_nesting_below_limit_reads() {
        let tag = Tag::from_bytes(&nested_lists(MAX_DEPTH - 1)).unwrap();
        let mut depth = 0;
        let mut current = tag.get("tiles").unwrap();
        while let Some(inner) = current.as_list().and_then(|list| list.first()) {
            current = inner;
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH - 2);
    }

    #[test]
    fn test_mixed_list_cannot_be_written() {
        let tag = Tag::List(vec![Tag::Int(1), Tag::Byte(1)]);
        assert!(tag.to_bytes().is_err());
    }

    #[test]
    fn test_empty_list() {
        let tag = Tag::List(vec![]);
        let mut buffer = Vec::new();
        tag.write(&mut buffer, "empty").unwrap();

        let (name, read_tag) = Tag::read(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(name, "empty");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_compound_bytes_do_not_depend_on_insertion_order() {
        let a = Tag::compound([("b", Tag::Int(2)), ("a", Tag::Int(1)), ("c", Tag::Int(3))]);
        let b = Tag::compound([("c", Tag::Int(3)), ("a", Tag::Int(1)), ("b", Tag::Int(2))]);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }
}
