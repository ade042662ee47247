//! PresentationML package writer.
//!
//! Produces a self-contained `.pptx` for a [`Deck`]: a title slide followed by
//! one "Title and Content" slide per [`Slide`](crate::deck::Slide).

use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Seek, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::template::{self, ct, rel, NS_A, NS_P, NS_R, SP_TREE_HEADER, XML_DECLARATION};
use super::PptxError;
use crate::deck::{Deck, BODY_FONT_SIZE_PT, TITLE_FONT_SIZE_PT};

/// First relationship id used for slides in presentation.xml.rels
const FIRST_SLIDE_REL: usize = 5;

/// Serialize a deck into `.pptx` bytes.
pub fn to_bytes(deck: &Deck, created: DateTime<Utc>) -> Result<Vec<u8>, PptxError> {
    let cursor = write_package(deck, created, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Write a deck as a `.pptx` package into `writer`.
pub fn write_package<W: Write + Seek>(
    deck: &Deck,
    created: DateTime<Utc>,
    writer: W,
) -> Result<W, PptxError> {
    let slide_count = deck.slide_count();
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut put = |name: &str, data: &str| -> Result<(), PptxError> {
        zip.start_file(name, options)?;
        zip.write_all(data.as_bytes())?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types_xml(slide_count)?)?;
    put("_rels/.rels", template::ROOT_RELS)?;
    put("docProps/core.xml", &core_props_xml(&deck.topic, created))?;
    put("docProps/app.xml", &app_props_xml(slide_count)?)?;
    put("ppt/presentation.xml", &presentation_xml(slide_count)?)?;
    put(
        "ppt/_rels/presentation.xml.rels",
        &presentation_rels_xml(slide_count)?,
    )?;
    put("ppt/presProps.xml", template::PRES_PROPS)?;
    put("ppt/tableStyles.xml", template::TABLE_STYLES)?;
    put("ppt/theme/theme1.xml", template::THEME)?;
    put("ppt/slideMasters/slideMaster1.xml", template::SLIDE_MASTER)?;
    put(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        template::SLIDE_MASTER_RELS,
    )?;
    put("ppt/slideLayouts/slideLayout1.xml", template::TITLE_LAYOUT)?;
    put("ppt/slideLayouts/slideLayout2.xml", template::CONTENT_LAYOUT)?;
    put(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        template::LAYOUT_RELS,
    )?;
    put(
        "ppt/slideLayouts/_rels/slideLayout2.xml.rels",
        template::LAYOUT_RELS,
    )?;

    put("ppt/slides/slide1.xml", &title_slide_xml(&deck.topic)?)?;
    put("ppt/slides/_rels/slide1.xml.rels", &slide_rels_xml(1)?)?;

    for (index, slide) in deck.slides.iter().enumerate() {
        let number = index + 2;
        put(
            &format!("ppt/slides/slide{number}.xml"),
            &content_slide_xml(&slide.title, &slide.body)?,
        )?;
        put(
            &format!("ppt/slides/_rels/slide{number}.xml.rels"),
            &slide_rels_xml(2)?,
        )?;
    }

    Ok(zip.finish()?)
}

fn content_types_xml(slide_count: usize) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECLARATION);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    write!(
        xml,
        r#"<Default Extension="rels" ContentType="{}"/><Default Extension="xml" ContentType="{}"/>"#,
        ct::RELATIONSHIPS,
        ct::XML
    )?;

    let overrides = [
        ("/ppt/presentation.xml", ct::PRESENTATION),
        ("/ppt/presProps.xml", ct::PRES_PROPS),
        ("/ppt/tableStyles.xml", ct::TABLE_STYLES),
        ("/ppt/theme/theme1.xml", ct::THEME),
        ("/ppt/slideMasters/slideMaster1.xml", ct::SLIDE_MASTER),
        ("/ppt/slideLayouts/slideLayout1.xml", ct::SLIDE_LAYOUT),
        ("/ppt/slideLayouts/slideLayout2.xml", ct::SLIDE_LAYOUT),
        ("/docProps/core.xml", ct::CORE_PROPERTIES),
        ("/docProps/app.xml", ct::EXTENDED_PROPERTIES),
    ];
    for (part, content_type) in overrides {
        write!(
            xml,
            r#"<Override PartName="{part}" ContentType="{content_type}"/>"#
        )?;
    }
    for number in 1..=slide_count {
        write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{number}.xml" ContentType="{}"/>"#,
            ct::SLIDE
        )?;
    }

    xml.push_str("</Types>");
    Ok(xml)
}

fn core_props_xml(topic: &str, created: DateTime<Utc>) -> String {
    let timestamp = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        concat!(
            r#"{decl}<cp:coreProperties "#,
            r#"xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:title>{title}</dc:title><dc:creator>decksmith</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{ts}</dcterms:created>"#,
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{ts}</dcterms:modified>"#,
            r#"</cp:coreProperties>"#
        ),
        decl = XML_DECLARATION,
        title = escape(topic),
        ts = timestamp
    )
}

fn app_props_xml(slide_count: usize) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(512);
    xml.push_str(XML_DECLARATION);
    xml.push_str(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#);
    xml.push_str(r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#);
    write!(
        xml,
        "<Application>decksmith</Application><Slides>{slide_count}</Slides>"
    )?;
    xml.push_str("</Properties>");
    Ok(xml)
}

fn presentation_xml(slide_count: usize) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
    )?;
    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);

    xml.push_str("<p:sldIdLst>");
    for index in 0..slide_count {
        write!(
            xml,
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + index,
            FIRST_SLIDE_REL + index
        )?;
    }
    xml.push_str("</p:sldIdLst>");

    write!(
        xml,
        r#"<p:sldSz cx="{}" cy="{}" type="screen4x3"/>"#,
        template::SLIDE_WIDTH,
        template::SLIDE_HEIGHT
    )?;
    xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    xml.push_str("</p:presentation>");
    Ok(xml)
}

fn presentation_rels_xml(slide_count: usize) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECLARATION);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    let fixed = [
        (rel::SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
        (rel::THEME, "theme/theme1.xml"),
        (rel::PRES_PROPS, "presProps.xml"),
        (rel::TABLE_STYLES, "tableStyles.xml"),
    ];
    for (index, (kind, target)) in fixed.iter().enumerate() {
        write_relationship(&mut xml, index + 1, kind, target)?;
    }
    for index in 0..slide_count {
        let target = format!("slides/slide{}.xml", index + 1);
        write_relationship(&mut xml, FIRST_SLIDE_REL + index, rel::SLIDE, &target)?;
    }

    xml.push_str("</Relationships>");
    Ok(xml)
}

fn slide_rels_xml(layout: usize) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(256);
    xml.push_str(XML_DECLARATION);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let target = format!("../slideLayouts/slideLayout{layout}.xml");
    write_relationship(&mut xml, 1, rel::SLIDE_LAYOUT, &target)?;
    xml.push_str("</Relationships>");
    Ok(xml)
}

fn write_relationship(
    xml: &mut String,
    id: usize,
    kind: &str,
    target: &str,
) -> Result<(), PptxError> {
    write!(
        xml,
        r#"<Relationship Id="rId{id}" Type="{kind}" Target="{target}"/>"#
    )?;
    Ok(())
}

fn open_slide(xml: &mut String) -> Result<(), PptxError> {
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    )?;
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(SP_TREE_HEADER);
    Ok(())
}

fn close_slide(xml: &mut String) {
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#);
    xml.push_str("</p:sld>");
}

/// Title slide: the topic in the centered title placeholder.
fn title_slide_xml(topic: &str) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(1024);
    open_slide(&mut xml)?;
    write_placeholder(
        &mut xml,
        2,
        "Title 1",
        r#"<p:ph type="ctrTitle"/>"#,
        &[topic],
        None,
    )?;
    close_slide(&mut xml);
    Ok(xml)
}

/// Content slide: title and body placeholders with fixed font sizes.
fn content_slide_xml(title: &str, body: &str) -> Result<String, PptxError> {
    let mut xml = String::with_capacity(2048 + body.len());
    open_slide(&mut xml)?;
    write_placeholder(
        &mut xml,
        2,
        "Title 1",
        r#"<p:ph type="title"/>"#,
        &[title],
        Some(TITLE_FONT_SIZE_PT),
    )?;
    let paragraphs: Vec<&str> = body.lines().collect();
    write_placeholder(
        &mut xml,
        3,
        "Content Placeholder 2",
        r#"<p:ph idx="1"/>"#,
        &paragraphs,
        Some(BODY_FONT_SIZE_PT),
    )?;
    close_slide(&mut xml);
    Ok(xml)
}

/// Write a placeholder shape with one paragraph per entry.
fn write_placeholder(
    xml: &mut String,
    shape_id: u32,
    name: &str,
    ph: &str,
    paragraphs: &[&str],
    font_size_pt: Option<u32>,
) -> Result<(), PptxError> {
    let size_attr = font_size_pt
        .map(|pt| format!(r#" sz="{}""#, pt * 100))
        .unwrap_or_default();

    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{shape_id}" name="{name}"/>"#)?;
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    write!(xml, "<p:nvPr>{ph}</p:nvPr>")?;
    xml.push_str("</p:nvSpPr><p:spPr/>");
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");

    if paragraphs.is_empty() {
        write!(xml, r#"<a:p><a:endParaRPr lang="en-US"{size_attr}/></a:p>"#)?;
    }
    for text in paragraphs {
        if text.is_empty() {
            write!(xml, r#"<a:p><a:endParaRPr lang="en-US"{size_attr}/></a:p>"#)?;
            continue;
        }
        write!(
            xml,
            r#"<a:p><a:r><a:rPr lang="en-US"{size_attr} dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
            escape(*text)
        )?;
    }

    xml.push_str("</p:txBody></p:sp>");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Slide;

    fn demo() -> Deck {
        Deck {
            topic: "Demo".into(),
            slides: vec![
                Slide {
                    title: "A".into(),
                    body: "x".into(),
                },
                Slide {
                    title: "B & <C>".into(),
                    body: "first\n\nthird".into(),
                },
            ],
        }
    }

    #[test]
    fn presentation_lists_every_slide() {
        let xml = presentation_xml(3).unwrap();
        assert!(xml.contains(r#"<p:sldId id="256" r:id="rId5"/>"#));
        assert!(xml.contains(r#"<p:sldId id="258" r:id="rId7"/>"#));
        assert!(!xml.contains("rId8"));

        let rels = presentation_rels_xml(3).unwrap();
        assert!(rels.contains(r#"Id="rId7""#));
        assert!(rels.contains(r#"Target="slides/slide3.xml""#));
    }

    #[test]
    fn content_slide_applies_font_sizes() {
        let xml = content_slide_xml("Title", "one\ntwo").unwrap();
        assert_eq!(xml.matches(r#"sz="3000""#).count(), 1);
        assert_eq!(xml.matches(r#"sz="1600""#).count(), 2);
    }

    #[test]
    fn text_is_escaped() {
        let xml = content_slide_xml("B & <C>", "a < b").unwrap();
        assert!(xml.contains("B &amp; &lt;C&gt;"));
        assert!(xml.contains("a &lt; b"));
    }

    #[test]
    fn blank_body_lines_become_empty_paragraphs() {
        let xml = content_slide_xml("T", "first\n\nthird").unwrap();
        assert_eq!(xml.matches("<a:p>").count(), 4);
        assert!(xml.contains(r#"<a:endParaRPr lang="en-US" sz="1600"/>"#));
    }

    #[test]
    fn package_contains_all_parts() {
        let bytes = to_bytes(&demo(), Utc::now()).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide3.xml",
            "ppt/slides/_rels/slide3.xml.rels",
            "ppt/slideLayouts/slideLayout2.xml",
            "ppt/theme/theme1.xml",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
        assert!(!names.contains(&"ppt/slides/slide4.xml"));
    }
}
