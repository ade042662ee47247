//! Read slide text back out of a `.pptx` package.
//!
//! Slides are returned in presentation order (the `sldIdLst` of
//! `ppt/presentation.xml`), each split into its title placeholder and the
//! remaining text paragraphs.

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::PptxError;

/// Text content of one slide
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideText {
    /// Text of the title (or centered title) placeholder
    pub title: Option<String>,
    /// Paragraphs of every other text shape, in document order
    pub paragraphs: Vec<String>,
}

/// Read every slide's text from a `.pptx` package.
pub fn read_slides<R: Read + Seek>(reader: R) -> Result<Vec<SlideText>, PptxError> {
    let mut archive = ZipArchive::new(reader)?;

    let presentation = read_part(&mut archive, "ppt/presentation.xml")?;
    let rels = read_part(&mut archive, "ppt/_rels/presentation.xml.rels")?;
    let targets = relationship_targets(&rels)?;

    slide_rel_ids(&presentation)?
        .into_iter()
        .map(|rel_id| {
            let target = targets
                .get(&rel_id)
                .ok_or_else(|| PptxError::MissingPart(format!("relationship {rel_id}")))?;
            let part = resolve_target("ppt", target);
            let xml = read_part(&mut archive, &part)?;
            parse_slide(&xml)
        })
        .collect()
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, PptxError> {
    let mut file = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => PptxError::MissingPart(name.to_string()),
        other => other.into(),
    })?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Relationship id → target for a `.rels` part
fn relationship_targets(xml: &str) -> Result<HashMap<String, String>, PptxError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(targets)
}

/// Relationship ids of the slides, in presentation order
fn slide_rel_ids(xml: &str) -> Result<Vec<String>, PptxError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = attribute(&e, b"r:id") {
                    ids.push(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(ids)
}

fn resolve_target(base: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base}/{target}"),
    }
}

#[derive(Default)]
struct ShapeState {
    is_title: bool,
    paragraphs: Vec<String>,
}

fn parse_slide(xml: &str) -> Result<SlideText, PptxError> {
    let mut reader = Reader::from_str(xml);
    let mut slide = SlideText::default();
    let mut shape: Option<ShapeState> = None;
    let mut paragraph: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => shape = Some(ShapeState::default()),
                b"p" if shape.is_some() => paragraph = Some(String::new()),
                b"t" => in_text = true,
                b"ph" => mark_placeholder(&mut shape, &e),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"ph" => mark_placeholder(&mut shape, &e),
                b"br" => {
                    if let Some(text) = paragraph.as_mut() {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_text => {
                if let Some(text) = paragraph.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) if in_text => {
                if let Some(text) = paragraph.as_mut() {
                    let name = String::from_utf8_lossy(&e);
                    push_entity(text, &name);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let (Some(text), Some(state)) = (paragraph.take(), shape.as_mut()) {
                        state.paragraphs.push(text);
                    }
                }
                b"sp" => {
                    if let Some(state) = shape.take() {
                        if state.is_title && slide.title.is_none() {
                            slide.title = Some(state.paragraphs.join("\n"));
                        } else {
                            slide.paragraphs.extend(state.paragraphs);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(slide)
}

fn mark_placeholder(shape: &mut Option<ShapeState>, element: &BytesStart<'_>) {
    if let Some(state) = shape.as_mut() {
        state.is_title = matches!(
            attribute(element, b"type").as_deref(),
            Some("title" | "ctrTitle")
        );
    }
}

/// Append the character(s) an entity or character reference stands for
fn push_entity(text: &mut String, name: &str) {
    let decoded = if let Some(hex) = name.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(decimal) = name.strip_prefix('#') {
        decimal.parse().ok().and_then(char::from_u32)
    } else {
        None
    };

    match decoded {
        Some(c) => text.push(c),
        None => match quick_xml::escape::resolve_xml_entity(name) {
            Some(value) => text.push_str(value),
            None => {
                text.push('&');
                text.push_str(name);
                text.push(';');
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_title_and_paragraphs_are_separated() {
        let xml = r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree>
            <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
              <p:txBody><a:p><a:r><a:t>Fish &amp; Chips</a:t></a:r></a:p></p:txBody></p:sp>
            <p:sp><p:nvSpPr><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
              <p:txBody><a:p><a:r><a:t>one</a:t></a:r></a:p><a:p><a:endParaRPr/></a:p>
              <a:p><a:r><a:t>two</a:t></a:r><a:br/><a:r><a:t>&#x263A;</a:t></a:r></a:p></p:txBody></p:sp>
            </p:spTree></p:cSld></p:sld>"#;
        let slide = parse_slide(xml).unwrap();
        assert_eq!(slide.title.as_deref(), Some("Fish & Chips"));
        assert_eq!(slide.paragraphs, vec!["one", "", "two\n\u{263A}"]);
    }

    #[test]
    fn relationship_targets_are_collected() {
        let xml = r#"<Relationships xmlns="x">
            <Relationship Id="rId1" Type="t" Target="slideMasters/slideMaster1.xml"/>
            <Relationship Id="rId5" Type="t" Target="slides/slide1.xml"/>
        </Relationships>"#;
        let targets = relationship_targets(xml).unwrap();
        assert_eq!(targets["rId5"], "slides/slide1.xml");
        assert_eq!(resolve_target("ppt", &targets["rId5"]), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("ppt", "/ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn non_zip_input_is_an_error() {
        let result = read_slides(std::io::Cursor::new(b"not a zip".to_vec()));
        assert!(matches!(result, Err(PptxError::Zip(_))));
    }
}
