//! PPTX file writer implementation.

use image::{ImageFormat, RgbImage};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use slide_core::geometry::{convert_geometry, slide_dimensions, FontScale, DEFAULT_DPI};
use slide_core::normalize::is_cjk;
use slide_core::{Error, Result, TextBlock, EMU_PER_INCH};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::templates::*;

/// Japanese-capable font used for every text box.
pub const DEFAULT_FONT_NAME: &str = "Yu Gothic UI";

/// PowerPoint's accepted slide edge range in EMU (1 inch to 56 inches).
const MIN_SLIDE_EMU: i64 = 914_400;
const MAX_SLIDE_EMU: i64 = 51_206_400;

/// Run font sizes are hundredths of a point, within 1pt..4000pt.
const MIN_FONT_HUNDREDTHS: i64 = 100;
const MAX_FONT_HUNDREDTHS: i64 = 400_000;

/// One output slide: a background raster and the text blocks laid over it.
#[derive(Debug, Clone)]
pub struct SlidePage {
    /// Full-slide background picture.
    pub background: RgbImage,

    /// Text boxes in reading order.
    pub blocks: Vec<TextBlock>,
}

impl SlidePage {
    pub fn new(background: RgbImage, blocks: Vec<TextBlock>) -> Self {
        Self { background, blocks }
    }
}

/// Writer for PPTX (Office Open XML) presentations.
#[derive(Debug, Clone)]
pub struct PptxWriter {
    /// Resolution the page rasters were produced at.
    dpi: u32,

    /// Pixel-to-point font conversion.
    font_scale: FontScale,

    /// Typeface for latin and east asian text.
    font_name: String,
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PptxWriter {
    /// Create a writer for rasters produced at `dpi`.
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            font_scale: FontScale::default().with_reference_dpi(dpi as f64),
            font_name: DEFAULT_FONT_NAME.to_string(),
        }
    }

    pub fn with_font_scale(mut self, font_scale: FontScale) -> Self {
        self.font_scale = font_scale;
        self
    }

    pub fn with_font_name(mut self, name: impl Into<String>) -> Self {
        self.font_name = name.into();
        self
    }

    /// Write the presentation to a file.
    pub fn save(&self, pages: &[SlidePage], path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write(pages, BufWriter::new(file))?;
        log::info!("Presentation saved to: {}", path.display());
        Ok(())
    }

    /// Write the presentation to any seekable sink.
    ///
    /// The slide size comes from the first page; later pages are stretched to it.
    pub fn write<W: Write + Seek>(&self, pages: &[SlidePage], sink: W) -> Result<()> {
        let first = pages.first().ok_or(Error::EmptyPresentation)?;
        let (cx, cy) = self.slide_size(&first.background)?;
        log::debug!(
            "Slide size {}x{}px -> {}x{} EMU",
            first.background.width(),
            first.background.height(),
            cx,
            cy
        );

        let mut zip = ZipWriter::new(sink);
        let xml_options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let media_options = FileOptions::default().compression_method(CompressionMethod::Stored);

        let put = |zip: &mut ZipWriter<W>,
                   name: &str,
                   bytes: &[u8],
                   options: FileOptions|
         -> Result<()> {
            zip.start_file(name, options)
                .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
            zip.write_all(bytes)
                .map_err(|e| Error::ZipError(format!("Failed to write '{}': {}", name, e)))
        };

        put(&mut zip, "[Content_Types].xml", &content_types_xml(pages.len())?, xml_options)?;
        put(&mut zip, "_rels/.rels", &package_rels_xml()?, xml_options)?;
        put(&mut zip, "ppt/presentation.xml", &presentation_xml(pages.len(), cx, cy)?, xml_options)?;
        put(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            &presentation_rels_xml(pages.len())?,
            xml_options,
        )?;
        put(&mut zip, SLIDE_MASTER_PATH, SLIDE_MASTER_XML.as_bytes(), xml_options)?;
        put(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS.as_bytes(),
            xml_options,
        )?;
        put(&mut zip, SLIDE_LAYOUT_PATH, SLIDE_LAYOUT_XML.as_bytes(), xml_options)?;
        put(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS.as_bytes(),
            xml_options,
        )?;
        put(&mut zip, THEME_PATH, THEME_XML.as_bytes(), xml_options)?;

        for (idx, page) in pages.iter().enumerate() {
            let number = idx + 1;
            let slide = self.slide_xml(page, cx, cy)?;
            put(&mut zip, &format!("ppt/slides/slide{}.xml", number), &slide, xml_options)?;
            put(
                &mut zip,
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                &slide_rels_xml(number)?,
                xml_options,
            )?;
            put(
                &mut zip,
                &format!("ppt/media/image{}.png", number),
                &encode_png(&page.background)?,
                media_options,
            )?;
            log::debug!("Added slide {} with {} text boxes", number, page.blocks.len());
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        Ok(())
    }

    fn slide_size(&self, first: &RgbImage) -> Result<(i64, i64)> {
        let (cx, cy) = slide_dimensions(first.width(), first.height(), self.dpi)?;
        let clamp = |v: i64| v.clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU);
        if clamp(cx) != cx || clamp(cy) != cy {
            log::warn!(
                "Slide size {}x{} EMU outside PowerPoint limits, clamping",
                cx,
                cy
            );
        }
        Ok((clamp(cx), clamp(cy)))
    }

    fn slide_xml(&self, page: &SlidePage, cx: i64, cy: i64) -> Result<Vec<u8>> {
        let mut w = XmlOut::new()?;

        w.start(
            "p:sld",
            &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)],
        )?;
        w.start("p:cSld", &[])?;
        w.start("p:spTree", &[])?;
        w.group_header()?;

        // Background picture, id 2
        w.start("p:pic", &[])?;
        w.start("p:nvPicPr", &[])?;
        w.empty("p:cNvPr", &[("id", "2"), ("name", "Background")])?;
        w.start("p:cNvPicPr", &[])?;
        w.empty("a:picLocks", &[("noChangeAspect", "1")])?;
        w.end("p:cNvPicPr")?;
        w.empty("p:nvPr", &[])?;
        w.end("p:nvPicPr")?;
        w.start("p:blipFill", &[])?;
        w.empty("a:blip", &[("r:embed", "rId2")])?;
        w.start("a:stretch", &[])?;
        w.empty("a:fillRect", &[])?;
        w.end("a:stretch")?;
        w.end("p:blipFill")?;
        w.start("p:spPr", &[])?;
        w.xfrm(0, 0, cx, cy)?;
        w.rect_geometry()?;
        w.end("p:spPr")?;
        w.end("p:pic")?;

        for (idx, block) in page.blocks.iter().enumerate() {
            self.text_box(&mut w, block, idx + 3)?;
        }

        w.end("p:spTree")?;
        w.end("p:cSld")?;
        w.start("p:clrMapOvr", &[])?;
        w.empty("a:masterClrMapping", &[])?;
        w.end("p:clrMapOvr")?;
        w.end("p:sld")?;

        Ok(w.finish())
    }

    /// Transparent, borderless, word-wrapped text box at the block's position.
    fn text_box(&self, w: &mut XmlOut, block: &TextBlock, shape_id: usize) -> Result<()> {
        let rect = convert_geometry(block.rect(), self.dpi as f64, EMU_PER_INCH as f64)?;
        let points = self.font_scale.points(block.font_size_px)?;
        let size = ((points * 100.0).round() as i64).clamp(MIN_FONT_HUNDREDTHS, MAX_FONT_HUNDREDTHS);
        let lang = if block.text.chars().any(is_cjk) {
            "ja-JP"
        } else {
            "en-US"
        };

        let id = shape_id.to_string();
        let name = format!("TextBox {}", shape_id - 2);
        let size = size.to_string();

        w.start("p:sp", &[])?;
        w.start("p:nvSpPr", &[])?;
        w.empty("p:cNvPr", &[("id", &id), ("name", &name)])?;
        w.empty("p:cNvSpPr", &[("txBox", "1")])?;
        w.empty("p:nvPr", &[])?;
        w.end("p:nvSpPr")?;

        w.start("p:spPr", &[])?;
        w.xfrm(rect.x, rect.y, rect.w, rect.h)?;
        w.rect_geometry()?;
        w.empty("a:noFill", &[])?;
        w.start("a:ln", &[])?;
        w.empty("a:noFill", &[])?;
        w.end("a:ln")?;
        w.end("p:spPr")?;

        w.start("p:txBody", &[])?;
        w.start("a:bodyPr", &[("wrap", "square"), ("rtlCol", "0")])?;
        w.empty("a:noAutofit", &[])?;
        w.end("a:bodyPr")?;
        w.empty("a:lstStyle", &[])?;

        for line in block.text.split('\n') {
            w.start("a:p", &[])?;
            w.empty("a:pPr", &[("algn", "l")])?;
            if !line.is_empty() {
                w.start("a:r", &[])?;
                w.start("a:rPr", &[("lang", lang), ("sz", &size), ("dirty", "0")])?;
                w.empty("a:latin", &[("typeface", &self.font_name)])?;
                w.empty("a:ea", &[("typeface", &self.font_name)])?;
                w.end("a:rPr")?;
                w.start("a:t", &[])?;
                w.text(line)?;
                w.end("a:t")?;
                w.end("a:r")?;
            }
            w.end("a:p")?;
        }

        w.end("p:txBody")?;
        w.end("p:sp")?;
        Ok(())
    }
}

fn content_types_xml(slide_count: usize) -> Result<Vec<u8>> {
    let mut w = XmlOut::new()?;
    w.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    w.empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
    w.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    w.empty("Default", &[("Extension", "png"), ("ContentType", "image/png")])?;

    let fixed = [
        ("/ppt/presentation.xml", CT_PRESENTATION),
        ("/ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER),
        ("/ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT),
        ("/ppt/theme/theme1.xml", CT_THEME),
    ];
    for (part, content_type) in fixed {
        w.empty("Override", &[("PartName", part), ("ContentType", content_type)])?;
    }
    for number in 1..=slide_count {
        let part = format!("/ppt/slides/slide{}.xml", number);
        w.empty("Override", &[("PartName", &part), ("ContentType", CT_SLIDE)])?;
    }

    w.end("Types")?;
    Ok(w.finish())
}

fn package_rels_xml() -> Result<Vec<u8>> {
    let mut w = XmlOut::new()?;
    w.start("Relationships", &[("xmlns", NS_RELS)])?;
    w.relationship("rId1", REL_OFFICE_DOCUMENT, "ppt/presentation.xml")?;
    w.end("Relationships")?;
    Ok(w.finish())
}

/// Relationship ids: rId1 master, rId2..=rId(n+1) slides, rId(n+2) theme.
fn presentation_xml(slide_count: usize, cx: i64, cy: i64) -> Result<Vec<u8>> {
    let mut w = XmlOut::new()?;
    w.start(
        "p:presentation",
        &[
            ("xmlns:a", NS_A),
            ("xmlns:r", NS_R),
            ("xmlns:p", NS_P),
            ("saveSubsetFonts", "1"),
        ],
    )?;

    w.start("p:sldMasterIdLst", &[])?;
    w.empty("p:sldMasterId", &[("id", "2147483648"), ("r:id", "rId1")])?;
    w.end("p:sldMasterIdLst")?;

    w.start("p:sldIdLst", &[])?;
    for idx in 0..slide_count {
        let id = (256 + idx).to_string();
        let rel = format!("rId{}", idx + 2);
        w.empty("p:sldId", &[("id", &id), ("r:id", &rel)])?;
    }
    w.end("p:sldIdLst")?;

    let (cx, cy) = (cx.to_string(), cy.to_string());
    w.empty("p:sldSz", &[("cx", &cx), ("cy", &cy)])?;
    w.empty("p:notesSz", &[("cx", "6858000"), ("cy", "9144000")])?;
    w.end("p:presentation")?;
    Ok(w.finish())
}

fn presentation_rels_xml(slide_count: usize) -> Result<Vec<u8>> {
    let mut w = XmlOut::new()?;
    w.start("Relationships", &[("xmlns", NS_RELS)])?;
    w.relationship("rId1", REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml")?;
    for idx in 0..slide_count {
        let id = format!("rId{}", idx + 2);
        let target = format!("slides/slide{}.xml", idx + 1);
        w.relationship(&id, REL_SLIDE, &target)?;
    }
    let theme_id = format!("rId{}", slide_count + 2);
    w.relationship(&theme_id, REL_THEME, "theme/theme1.xml")?;
    w.end("Relationships")?;
    Ok(w.finish())
}

fn slide_rels_xml(number: usize) -> Result<Vec<u8>> {
    let mut w = XmlOut::new()?;
    w.start("Relationships", &[("xmlns", NS_RELS)])?;
    w.relationship("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")?;
    let media = format!("../media/image{}.png", number);
    w.relationship("rId2", REL_IMAGE, &media)?;
    w.end("Relationships")?;
    Ok(w.finish())
}

/// PNG keeps the background lossless.
fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| Error::Image(format!("Failed to encode PNG: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Thin wrapper over the quick-xml writer that maps errors into ours.
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::XmlError(e.to_string())
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_error)?;
        Ok(Self { writer })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Start(element))
            .map_err(xml_error)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Empty(element))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)
    }

    fn relationship(&mut self, id: &str, rel_type: &str, target: &str) -> Result<()> {
        self.empty(
            "Relationship",
            &[("Id", id), ("Type", rel_type), ("Target", target)],
        )
    }

    fn xfrm(&mut self, x: i64, y: i64, cx: i64, cy: i64) -> Result<()> {
        let (x, y, cx, cy) = (x.to_string(), y.to_string(), cx.to_string(), cy.to_string());
        self.start("a:xfrm", &[])?;
        self.empty("a:off", &[("x", &x), ("y", &y)])?;
        self.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
        self.end("a:xfrm")
    }

    fn rect_geometry(&mut self) -> Result<()> {
        self.start("a:prstGeom", &[("prst", "rect")])?;
        self.empty("a:avLst", &[])?;
        self.end("a:prstGeom")
    }

    /// The spTree's own non-visual and group properties.
    fn group_header(&mut self) -> Result<()> {
        self.start("p:nvGrpSpPr", &[])?;
        self.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
        self.empty("p:cNvGrpSpPr", &[])?;
        self.empty("p:nvPr", &[])?;
        self.end("p:nvGrpSpPr")?;
        self.start("p:grpSpPr", &[])?;
        self.start("a:xfrm", &[])?;
        self.empty("a:off", &[("x", "0"), ("y", "0")])?;
        self.empty("a:ext", &[("cx", "0"), ("cy", "0")])?;
        self.empty("a:chOff", &[("x", "0"), ("y", "0")])?;
        self.empty("a:chExt", &[("cx", "0"), ("cy", "0")])?;
        self.end("a:xfrm")?;
        self.end("p:grpSpPr")
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}
