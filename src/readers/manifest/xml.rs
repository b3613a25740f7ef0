//! Text XML manifests.

use super::{Attribute, Element};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

fn element_from(e: &BytesStart<'_>) -> Result<Element, String> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        // android:versionCode and versionCode are the same attribute here
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        attributes.push(Attribute {
            name,
            value,
            resource_id: 0,
        });
    }
    Ok(Element {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
    })
}

/// Build the element tree of an XML document
pub(super) fn parse(bytes: &[u8]) -> Result<Element, String> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    let attach = |stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element| {
        match stack.last_mut() {
            Some(parent) => parent.children.push(el),
            None => {
                if root.is_none() {
                    *root = Some(el);
                }
            }
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(element_from(e)?),
            Ok(Event::Empty(ref e)) => {
                let el = element_from(e)?;
                attach(&mut stack, &mut root, el);
            }
            Ok(Event::End(_)) => {
                let el = stack.pop().ok_or("unbalanced closing tag")?;
                attach(&mut stack, &mut root, el);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let root = parse(br#"<a x="1"><b><c y="2"/></b><d/></a>"#).unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].children[0].attributes[0].value, "2");
    }

    #[test]
    fn test_namespace_prefix_is_stripped() {
        let root = parse(br#"<m xmlns:android="ns" android:versionName="1.2"/>"#).unwrap();
        assert_eq!(root.attributes.len(), 1);
        assert_eq!(root.attributes[0].name, "versionName");
    }

    #[test]
    fn test_unclosed_document_fails() {
        assert!(parse(b"<a><b>").is_err());
    }
}
