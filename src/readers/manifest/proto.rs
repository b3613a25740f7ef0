//! Protobuf `XmlNode` manifests as stored in an AAB.
//!
//! Only the fields needed for identity extraction are decoded:
//!
//! ```text
//! XmlNode      { XmlElement element = 1; string text = 2; }
//! XmlElement   { string name = 3; repeated XmlAttribute attribute = 4; repeated XmlNode child = 5; }
//! XmlAttribute { string name = 2; string value = 3; uint32 resource_id = 5; }
//! ```

use super::{Attribute, Element};

enum Value<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn varint(&mut self) -> Result<u64, String> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or("truncated varint")?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err("varint overflow".to_string())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(len).ok_or("length overflow")?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or("truncated length-delimited field")?;
        self.pos = end;
        Ok(slice)
    }

    fn next_field(&mut self) -> Option<Result<(u64, Value<'a>), String>> {
        if self.pos >= self.buf.len() {
            return None;
        }
        Some(self.read_field())
    }

    fn read_field(&mut self) -> Result<(u64, Value<'a>), String> {
        let key = self.varint()?;
        let field = key >> 3;
        let value = match key & 0x7 {
            0 => Value::Varint(self.varint()?),
            1 => {
                self.take(8)?;
                Value::Fixed
            }
            2 => {
                let len = usize::try_from(self.varint()?).map_err(|e| e.to_string())?;
                Value::Bytes(self.take(len)?)
            }
            5 => {
                self.take(4)?;
                Value::Fixed
            }
            other => return Err(format!("unsupported wire type {other}")),
        };
        Ok((field, value))
    }
}

fn string(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
}

fn node(buf: &[u8]) -> Result<Option<Element>, String> {
    let mut fields = Fields::new(buf);
    let mut element = None;
    while let Some(field) = fields.next_field() {
        if let (1, Value::Bytes(bytes)) = field? {
            element = Some(parse_element(bytes)?);
        }
    }
    Ok(element)
}

fn parse_element(buf: &[u8]) -> Result<Element, String> {
    let mut element = Element::default();
    let mut fields = Fields::new(buf);
    while let Some(field) = fields.next_field() {
        match field? {
            (3, Value::Bytes(bytes)) => element.name = string(bytes)?,
            (4, Value::Bytes(bytes)) => element.attributes.push(attribute(bytes)?),
            (5, Value::Bytes(bytes)) => {
                if let Some(child) = node(bytes)? {
                    element.children.push(child);
                }
            }
            _ => {}
        }
    }
    Ok(element)
}

fn attribute(buf: &[u8]) -> Result<Attribute, String> {
    let mut attr = Attribute::default();
    let mut fields = Fields::new(buf);
    while let Some(field) = fields.next_field() {
        match field? {
            (2, Value::Bytes(bytes)) => attr.name = string(bytes)?,
            (3, Value::Bytes(bytes)) => attr.value = string(bytes)?,
            (5, Value::Varint(id)) => {
                attr.resource_id = u32::try_from(id).map_err(|e| e.to_string())?
            }
            _ => {}
        }
    }
    Ok(attr)
}

/// Decode the root `XmlNode`
pub(super) fn parse(bytes: &[u8]) -> Result<Element, String> {
    node(bytes)?.ok_or_else(|| "root node is not an element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_decoding() {
        let mut fields = Fields::new(&[0x9b, 0x84, 0x84, 0x08]);
        assert_eq!(fields.varint().unwrap(), 16843291);
        assert!(Fields::new(&[0x80]).varint().is_err());
    }

    #[test]
    fn test_text_root_is_rejected() {
        // XmlNode { text = "hi" }
        assert!(parse(&[0x12, 0x02, b'h', b'i']).is_err());
    }

    #[test]
    fn test_decodes_generated_manifest() {
        let root = parse(&crate::readers::manifest::tests::proto_manifest()).unwrap();
        assert_eq!(root.name, "manifest");
        assert_eq!(root.children[1].name, "application");
        assert_eq!(root.children[1].children.len(), 3);
    }
}
