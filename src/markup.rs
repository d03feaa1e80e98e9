//! Default parser and serializer adapters.
//!
//! Input is an XHTML-style fragment: well-formed, any number of top-level
//! nodes, void elements written as `<br/>`. Whitespace is kept verbatim so a
//! parse/serialize pass does not change text content.

use indextree::NodeId;
use quick_xml::escape::{escape, partial_escape, resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::MarkupError;
use crate::tree::{Document, NodeKind};

/// Parse `markup` into a new fragment root owned by `doc`.
pub fn parse_fragment(doc: &mut Document, markup: &str) -> Result<NodeId, MarkupError> {
    let root = doc.create_fragment();
    if let Err(err) = parse_into(doc, root, markup) {
        doc.remove(root);
        return Err(err);
    }
    Ok(root)
}

/// Parse `markup` and append the resulting nodes to `parent`.
pub fn parse_into(doc: &mut Document, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
    let mut reader = Reader::from_reader(markup.as_bytes());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::with_capacity(64);
    let mut stack: Vec<NodeId> = Vec::with_capacity(16);
    stack.push(parent);
    let mut entity_buf = String::with_capacity(16);

    loop {
        let top = stack.last().copied().unwrap_or(parent);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let node = element_from_start(doc, &reader, &e)?;
                doc.append(top, node);
                stack.push(node);
            }
            Ok(Event::Empty(e)) => {
                let node = element_from_start(doc, &reader, &e)?;
                doc.append(top, node);
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| {
                    MarkupError::new("MARKUP_DECODE", format!("text decode error: {:?}", err))
                        .with_offset(token_offset(&reader))
                })?;
                push_text(doc, top, text.as_ref());
            }
            Ok(Event::CData(e)) => {
                let text = reader.decoder().decode(&e).map_err(|err| {
                    MarkupError::new("MARKUP_DECODE", format!("cdata decode error: {:?}", err))
                        .with_offset(token_offset(&reader))
                })?;
                push_text(doc, top, text.as_ref());
            }
            Ok(Event::GeneralRef(e)) => {
                let name = e.decode().map_err(|err| {
                    MarkupError::new("MARKUP_DECODE", format!("entity decode error: {:?}", err))
                        .with_offset(token_offset(&reader))
                })?;
                entity_buf.clear();
                entity_buf.push('&');
                entity_buf.push_str(name.as_ref());
                entity_buf.push(';');
                let resolved = unescape_with(&entity_buf, resolve_html5_entity).map_err(|err| {
                    MarkupError::new(
                        "MARKUP_ENTITY",
                        format!("unknown entity {}: {:?}", entity_buf, err),
                    )
                    .with_offset(token_offset(&reader))
                })?;
                push_text(doc, top, resolved.as_ref());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(
                    MarkupError::new("MARKUP_SYNTAX", format!("xml error: {:?}", err))
                        .with_offset(token_offset(&reader)),
                );
            }
        }
        buf.clear();
    }

    if stack.len() > 1 {
        log::warn!(
            "markup ended with {} unclosed element(s); closing implicitly",
            stack.len() - 1
        );
    }
    Ok(())
}

/// Serialized markup of `node`'s children.
pub fn inner_markup(doc: &Document, node: NodeId) -> String {
    let mut out = String::with_capacity(256);
    for child in doc.children(node) {
        write_node(doc, child, &mut out);
    }
    out
}

/// Serialized markup of `node` itself. Fragments serialize as their children.
pub fn outer_markup(doc: &Document, node: NodeId) -> String {
    let mut out = String::with_capacity(256);
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Fragment) => {
            for child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
        Some(NodeKind::Element(el)) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape(value.as_str()));
                out.push('"');
            }
            if !doc.has_children(node) && el.is_void() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
        Some(NodeKind::Text(text)) => out.push_str(&partial_escape(text.as_str())),
        None => {}
    }
}

fn push_text(doc: &mut Document, parent: NodeId, text: &str) {
    if text.is_empty() {
        return;
    }
    // Entity references arrive as separate events; keep one text node per run.
    if let Some(last) = doc.last_child(parent) {
        if let Some(existing) = doc.text(last) {
            let mut merged = String::with_capacity(existing.len() + text.len());
            merged.push_str(existing);
            merged.push_str(text);
            doc.set_text(last, merged);
            return;
        }
    }
    let node = doc.create_text(text);
    doc.append(parent, node);
}

fn element_from_start(
    doc: &mut Document,
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
) -> Result<NodeId, MarkupError> {
    let tag = decode_name(reader, e.name().as_ref())?;
    let node = doc.create_element(tag);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| {
            MarkupError::new("MARKUP_ATTRIBUTE", format!("attribute error: {:?}", err))
                .with_offset(token_offset(reader))
        })?;
        let name = decode_name(reader, attr.key.as_ref())?;
        let raw = reader.decoder().decode(&attr.value).map_err(|err| {
            MarkupError::new("MARKUP_DECODE", format!("attribute decode error: {:?}", err))
                .with_offset(token_offset(reader))
        })?;
        let value = unescape_with(raw.as_ref(), resolve_html5_entity).map_err(|err| {
            MarkupError::new("MARKUP_ENTITY", format!("attribute entity error: {:?}", err))
                .with_offset(token_offset(reader))
        })?;
        doc.set_attr(node, &name, value.into_owned());
    }
    Ok(node)
}

fn decode_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, MarkupError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        MarkupError::new("MARKUP_DECODE", format!("name decode error: {:?}", err))
            .with_offset(token_offset(reader))
    })?;
    Ok(decoded.to_ascii_lowercase())
}

fn token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}
