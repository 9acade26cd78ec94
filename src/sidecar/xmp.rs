//! XMP document encoding for [`ImageMetadata`].

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;

use crate::error::SidecarError;
use crate::metadata::ImageMetadata;

pub const NS_X: &str = "adobe:ns:meta/";
pub const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_WALLSORT: &str = "https://wallsort.dev/ns/1.0/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Rdf,
    Dc,
    Wallsort,
    Other,
}

impl Ns {
    fn from_resolved(resolved: &ResolveResult) -> Self {
        match resolved {
            ResolveResult::Bound(Namespace(uri)) => match *uri {
                u if u == NS_RDF.as_bytes() => Ns::Rdf,
                u if u == NS_DC.as_bytes() => Ns::Dc,
                u if u == NS_WALLSORT.as_bytes() => Ns::Wallsort,
                _ => Ns::Other,
            },
            _ => Ns::Other,
        }
    }
}

/// Properties stored as children of `rdf:Description`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Description,
    Tags,
    Source,
    AiModel,
    Mood,
    Style,
    Colors,
    TimeOfDay,
    Subject,
    Scene,
    Width,
    Height,
    RecommendedScreen,
}

impl Property {
    fn lookup(ns: Ns, local: &[u8]) -> Option<Self> {
        let property = match (ns, local) {
            (Ns::Dc, b"description") => Property::Description,
            (Ns::Dc, b"subject") => Property::Tags,
            (Ns::Dc, b"source") => Property::Source,
            (Ns::Wallsort, b"ai_model") => Property::AiModel,
            (Ns::Wallsort, b"mood") => Property::Mood,
            (Ns::Wallsort, b"style") => Property::Style,
            (Ns::Wallsort, b"colors") => Property::Colors,
            (Ns::Wallsort, b"time_of_day") => Property::TimeOfDay,
            (Ns::Wallsort, b"subject") => Property::Subject,
            (Ns::Wallsort, b"scene") => Property::Scene,
            (Ns::Wallsort, b"width") => Property::Width,
            (Ns::Wallsort, b"height") => Property::Height,
            (Ns::Wallsort, b"recommended_screen") => Property::RecommendedScreen,
            _ => return None,
        };
        Some(property)
    }

    fn list<'a>(&self, meta: &'a mut ImageMetadata) -> Option<&'a mut Vec<String>> {
        match self {
            Property::Tags => Some(&mut meta.tags),
            Property::Mood => Some(&mut meta.mood),
            Property::Colors => Some(&mut meta.colors),
            _ => None,
        }
    }

    fn assign(&self, meta: &mut ImageMetadata, value: String) {
        if value.trim().is_empty() {
            return;
        }
        match self {
            Property::Description => meta.description = value,
            Property::Source => meta.source = value,
            Property::AiModel => meta.ai_model = value,
            Property::Style => meta.style = value,
            Property::TimeOfDay => meta.time_of_day = value,
            Property::Subject => meta.subject = value,
            Property::Scene => meta.scene = value,
            Property::RecommendedScreen => meta.recommended_screen = value,
            Property::Width => meta.width = parse_dimension(&value),
            Property::Height => meta.height = parse_dimension(&value),
            Property::Tags | Property::Mood | Property::Colors => {}
        }
    }
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Description,
    Item,
    Property(Property),
    Other,
}

impl Element {
    fn classify(ns: Ns, local: &[u8]) -> Self {
        match (ns, local) {
            (Ns::Rdf, b"Description") => Element::Description,
            (Ns::Rdf, b"li") => Element::Item,
            _ => Property::lookup(ns, local)
                .map(Element::Property)
                .unwrap_or(Element::Other),
        }
    }
}

/// Parse an XMP document. Properties outside `rdf:Description` and unknown
/// elements are ignored; structural errors are reported as `Parse`.
pub(super) fn parse(content: &str) -> Result<ImageMetadata, SidecarError> {
    let mut reader = NsReader::from_str(content);
    let mut meta = ImageMetadata::default();

    let mut stack: Vec<Element> = Vec::new();
    // Property being read and the stack depth of its element.
    let mut current: Option<(Property, usize)> = None;
    let mut text = String::new();
    let mut alt_value: Option<String> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let ns = Ns::from_resolved(&resolved);

        match event {
            Event::Start(e) => {
                let element = Element::classify(ns, e.local_name().as_ref());
                let under_description = stack.last() == Some(&Element::Description);
                stack.push(element);

                match (current, element) {
                    (None, Element::Property(property)) if under_description => {
                        current = Some((property, stack.len()));
                        text.clear();
                        alt_value = None;
                    }
                    (Some(_), Element::Item) => text.clear(),
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current.is_some() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                let element = stack
                    .pop()
                    .ok_or_else(|| SidecarError::Parse("unbalanced end tag".to_string()))?;

                if let Some((property, property_depth)) = current {
                    if element == Element::Item && depth > property_depth {
                        let value = std::mem::take(&mut text);
                        match property.list(&mut meta) {
                            Some(list) => {
                                if !value.trim().is_empty() {
                                    list.push(value);
                                }
                            }
                            // rdf:Alt; the first (x-default) entry wins
                            None => {
                                if alt_value.is_none() {
                                    alt_value = Some(value);
                                }
                            }
                        }
                    } else if depth == property_depth {
                        let value = alt_value.take().unwrap_or_else(|| std::mem::take(&mut text));
                        property.assign(&mut meta, value);
                        current = None;
                        text.clear();
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SidecarError::Parse(
            "document ended before all elements were closed".to_string(),
        ));
    }

    Ok(meta)
}

/// Render a complete XMP document. Empty fields produce no element at all.
pub(super) fn render(meta: &ImageMetadata) -> Result<Vec<u8>, SidecarError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("x:xmpmeta").with_attributes([("xmlns:x", NS_X)]),
    ))?;
    w.write_event(Event::Start(
        BytesStart::new("rdf:RDF").with_attributes([("xmlns:rdf", NS_RDF)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("rdf:Description").with_attributes([
        ("rdf:about", ""),
        ("xmlns:dc", NS_DC),
        ("xmlns:wallsort", NS_WALLSORT),
    ])))?;

    if !meta.description.is_empty() {
        w.write_event(Event::Start(BytesStart::new("dc:description")))?;
        w.write_event(Event::Start(BytesStart::new("rdf:Alt")))?;
        w.write_event(Event::Start(
            BytesStart::new("rdf:li").with_attributes([("xml:lang", "x-default")]),
        ))?;
        w.write_event(Event::Text(BytesText::new(&meta.description)))?;
        w.write_event(Event::End(BytesEnd::new("rdf:li")))?;
        w.write_event(Event::End(BytesEnd::new("rdf:Alt")))?;
        w.write_event(Event::End(BytesEnd::new("dc:description")))?;
    }

    write_bag(&mut w, "dc:subject", &meta.tags)?;
    write_text(&mut w, "dc:source", &meta.source)?;
    write_text(&mut w, "wallsort:ai_model", &meta.ai_model)?;
    write_bag(&mut w, "wallsort:mood", &meta.mood)?;
    write_text(&mut w, "wallsort:style", &meta.style)?;
    write_bag(&mut w, "wallsort:colors", &meta.colors)?;
    write_text(&mut w, "wallsort:time_of_day", &meta.time_of_day)?;
    write_text(&mut w, "wallsort:subject", &meta.subject)?;
    write_text(&mut w, "wallsort:scene", &meta.scene)?;
    if let Some(width) = meta.width {
        write_text(&mut w, "wallsort:width", &width.to_string())?;
    }
    if let Some(height) = meta.height {
        write_text(&mut w, "wallsort:height", &height.to_string())?;
    }
    write_text(&mut w, "wallsort:recommended_screen", &meta.recommended_screen)?;

    w.write_event(Event::End(BytesEnd::new("rdf:Description")))?;
    w.write_event(Event::End(BytesEnd::new("rdf:RDF")))?;
    w.write_event(Event::End(BytesEnd::new("x:xmpmeta")))?;

    let mut document = w.into_inner();
    document.push(b'\n');
    Ok(document)
}

fn write_text(w: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<(), SidecarError> {
    if value.is_empty() {
        return Ok(());
    }
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_bag(w: &mut Writer<Vec<u8>>, name: &str, values: &[String]) -> Result<(), SidecarError> {
    if values.is_empty() {
        return Ok(());
    }
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Start(BytesStart::new("rdf:Bag")))?;
    for value in values {
        w.write_event(Event::Start(BytesStart::new("rdf:li")))?;
        w.write_event(Event::Text(BytesText::new(value)))?;
        w.write_event(Event::End(BytesEnd::new("rdf:li")))?;
    }
    w.write_event(Event::End(BytesEnd::new("rdf:Bag")))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shape() {
        let meta = ImageMetadata {
            description: "misty forest".to_string(),
            tags: vec!["forest".to_string(), "fog".to_string()],
            mood: vec!["calm".to_string()],
            ..Default::default()
        };
        let xml = String::from_utf8(render(&meta).unwrap()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<rdf:li xml:lang=\"x-default\">misty forest</rdf:li>"));
        assert!(xml.contains("<dc:subject>"));
        assert!(xml.contains("<rdf:li>fog</rdf:li>"));
        assert!(xml.contains("<wallsort:mood>"));
        assert!(!xml.contains("wallsort:style"));
    }

    #[test]
    fn test_bag_order_is_preserved() {
        let meta = ImageMetadata {
            colors: vec!["zinc".to_string(), "amber".to_string(), "blue".to_string()],
            ..Default::default()
        };
        let xml = String::from_utf8(render(&meta).unwrap()).unwrap();
        assert_eq!(parse(&xml).unwrap().colors, vec!["zinc", "amber", "blue"]);
    }

    #[test]
    fn test_properties_outside_description_are_ignored() {
        let xml = format!(
            r#"<x:xmpmeta xmlns:x="{}" xmlns:dc="{}"><dc:source>stray</dc:source></x:xmpmeta>"#,
            NS_X, NS_DC
        );
        assert!(parse(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_tags_are_errors() {
        let xml = format!(r#"<x:xmpmeta xmlns:x="{}"><a></b></x:xmpmeta>"#, NS_X);
        assert!(matches!(parse(&xml), Err(SidecarError::Parse(_))));
    }
}
