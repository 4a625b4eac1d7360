//! PDF assembly. Consumes chapters one at a time and produces a linear A4 document: a cover
//! page, then per chapter a banner plus one page per decoded image, or a single placeholder
//! page when nothing could be decoded.

mod text;

use crate::model::{ChapterRecord, FetchOutcome};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use text::{pdf_text, truncate_chars};
use thiserror::Error;
use tracing::{debug, warn};

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
/// Inset of the printable area on every side.
pub const MARGIN: f32 = 15.0;

const TEXT_LEFT: f32 = 40.0;
const COVER_TITLE_CHARS: usize = 50;
const PLACEHOLDER_URL_CHARS: usize = 100;
const PLACEHOLDER_MESSAGE: &str = "No images could be retrieved for this chapter.";

const FONT_REGULAR: Name<'static> = Name(b"F1");
const FONT_BOLD: Name<'static> = Name(b"F2");
const IMAGE_NAME: Name<'static> = Name(b"Im1");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Decoded images narrower or shorter than this are dropped.
    pub min_image_dimension: u32,
    pub jpeg_quality: u8,
    /// Stamp "{chapter}-{page}" under each image.
    pub footer: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            min_image_dimension: 100,
            jpeg_quality: 75,
            footer: true,
        }
    }
}

/// One page of the output, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    Banner { chapter: String },
    /// `page_index` is the 1-based running image index across the whole document.
    Content { chapter: String, page_index: usize },
    Placeholder { chapter: String },
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Cannot assemble PDF: no chapters were added.")]
    NoChapters,
}

/// Finished document bytes plus the page sequence that produced them.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    pub pages: Vec<PageKind>,
}

/// A decoded page image re-encoded as JPEG, ready to embed.
struct PreparedImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
    gray: bool,
}

fn is_gray(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    )
}

fn encode_jpeg(img: &DynamicImage, gray: bool, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    if gray {
        img.to_luma8().write_with_encoder(encoder)?;
    } else {
        img.to_rgb8().write_with_encoder(encoder)?;
    }
    Ok(buf)
}

/// Decode, size-check and re-encode one payload. None means the image is dropped.
fn prepare(outcome: &FetchOutcome, options: &AssemblyOptions) -> Option<PreparedImage> {
    let img = match image::load_from_memory(&outcome.payload) {
        Ok(img) => img,
        Err(e) => {
            warn!("cannot decode {}: {}", outcome.location, e);
            return None;
        }
    };
    let (width, height) = img.dimensions();
    if width < options.min_image_dimension || height < options.min_image_dimension {
        debug!("{} too small ({}x{})", outcome.location, width, height);
        return None;
    }
    let gray = is_gray(img.color());
    match encode_jpeg(&img, gray, options.jpeg_quality) {
        Ok(jpeg) => Some(PreparedImage {
            jpeg,
            width,
            height,
            gray,
        }),
        Err(e) => {
            warn!("cannot re-encode {}: {}", outcome.location, e);
            None
        }
    }
}

/// Fit `w` x `h` into the printable area, centered. Returns (x, y, width, height).
fn placement(w: u32, h: u32) -> (f32, f32, f32, f32) {
    let pw = PAGE_WIDTH - 2.0 * MARGIN;
    let ph = PAGE_HEIGHT - 2.0 * MARGIN;
    let scale = (pw / w as f32).min(ph / h as f32);
    let (nw, nh) = (w as f32 * scale, h as f32 * scale);
    ((PAGE_WIDTH - nw) / 2.0, (PAGE_HEIGHT - nh) / 2.0, nw, nh)
}

fn write_text(content: &mut Content, font: Name<'_>, size: f32, x: f32, y: f32, s: &str) {
    let line = pdf_text(s);
    content.begin_text();
    content.set_font(font, size);
    content.next_line(x, y);
    content.show(Str(line.as_bytes()));
    content.end_text();
}

fn chapter_heading(chapter: &ChapterRecord) -> String {
    format!("Chapter {}", chapter.number)
}

/// Incremental PDF builder. Pages are written as chapters arrive; the page tree is
/// closed by [Assembler::finish].
pub struct Assembler {
    pdf: Pdf,
    options: AssemblyOptions,
    next_ref: i32,
    page_tree: Ref,
    font_regular: Ref,
    font_bold: Ref,
    page_refs: Vec<Ref>,
    pages: Vec<PageKind>,
    images_placed: usize,
    chapters_added: usize,
}

impl Assembler {
    /// Start a document and write its cover page.
    pub fn new(title: &str, chapter_count: usize, options: AssemblyOptions) -> Self {
        let mut pdf = Pdf::new();
        let catalog = Ref::new(1);
        let page_tree = Ref::new(2);
        let font_regular = Ref::new(3);
        let font_bold = Ref::new(4);
        let info = Ref::new(5);
        pdf.catalog(catalog).pages(page_tree);
        pdf.type1_font(font_regular).base_font(Name(b"Helvetica"));
        pdf.type1_font(font_bold).base_font(Name(b"Helvetica-Bold"));
        pdf.document_info(info).title(TextStr(title));

        let mut assembler = Self {
            pdf,
            options,
            next_ref: 6,
            page_tree,
            font_regular,
            font_bold,
            page_refs: Vec::new(),
            pages: Vec::new(),
            images_placed: 0,
            chapters_added: 0,
        };

        let mut content = Content::new();
        write_text(
            &mut content,
            FONT_BOLD,
            22.0,
            TEXT_LEFT,
            PAGE_HEIGHT - 80.0,
            &truncate_chars(title, COVER_TITLE_CHARS),
        );
        let count = match chapter_count {
            1 => "1 Chapter".to_string(),
            n => format!("{} Chapters", n),
        };
        write_text(&mut content, FONT_REGULAR, 12.0, TEXT_LEFT, PAGE_HEIGHT - 105.0, &count);
        assembler.push_page(PageKind::Cover, content, None);
        assembler
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_ref);
        self.next_ref += 1;
        r
    }

    fn push_page(&mut self, kind: PageKind, content: Content, image: Option<Ref>) {
        let page_id = self.alloc();
        let content_id = self.alloc();
        {
            let mut page = self.pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            page.parent(self.page_tree);
            page.contents(content_id);
            let mut resources = page.resources();
            resources
                .fonts()
                .pair(FONT_REGULAR, self.font_regular)
                .pair(FONT_BOLD, self.font_bold);
            if let Some(image_id) = image {
                resources.x_objects().pair(IMAGE_NAME, image_id);
            }
            resources.finish();
            page.finish();
        }
        self.pdf.stream(content_id, &content.finish());
        self.page_refs.push(page_id);
        self.pages.push(kind);
    }

    fn embed(&mut self, img: &PreparedImage) -> Ref {
        let id = self.alloc();
        let mut xobject = self.pdf.image_xobject(id, &img.jpeg);
        xobject.filter(Filter::DctDecode);
        xobject.width(img.width as i32);
        xobject.height(img.height as i32);
        if img.gray {
            xobject.color_space().device_gray();
        } else {
            xobject.color_space().device_rgb();
        }
        xobject.bits_per_component(8);
        xobject.finish();
        id
    }

    /// Add one chapter. `outcomes` must be in reading order; entries that fail to decode
    /// or are too small are dropped. Returns the number of image pages written.
    pub fn add_chapter(&mut self, chapter: &ChapterRecord, outcomes: &[FetchOutcome]) -> usize {
        self.chapters_added += 1;
        let number = chapter.number.to_string();
        let prepared: Vec<PreparedImage> = outcomes
            .iter()
            .filter_map(|o| prepare(o, &self.options))
            .collect();

        if prepared.is_empty() {
            let mut content = Content::new();
            let heading = chapter_heading(chapter);
            write_text(&mut content, FONT_BOLD, 18.0, TEXT_LEFT, PAGE_HEIGHT - 80.0, &heading);
            write_text(
                &mut content,
                FONT_REGULAR,
                12.0,
                TEXT_LEFT,
                PAGE_HEIGHT - 110.0,
                PLACEHOLDER_MESSAGE,
            );
            write_text(
                &mut content,
                FONT_REGULAR,
                9.0,
                TEXT_LEFT,
                PAGE_HEIGHT - 130.0,
                &truncate_chars(&chapter.url, PLACEHOLDER_URL_CHARS),
            );
            self.push_page(PageKind::Placeholder { chapter: number }, content, None);
            return 0;
        }

        let mut banner = Content::new();
        write_text(
            &mut banner,
            FONT_BOLD,
            18.0,
            TEXT_LEFT,
            PAGE_HEIGHT - 80.0,
            &chapter_heading(chapter),
        );
        write_text(
            &mut banner,
            FONT_REGULAR,
            12.0,
            TEXT_LEFT,
            PAGE_HEIGHT - 105.0,
            &truncate_chars(&chapter.title, 80),
        );
        self.push_page(
            PageKind::Banner {
                chapter: number.clone(),
            },
            banner,
            None,
        );

        for img in &prepared {
            let image_id = self.embed(img);
            self.images_placed += 1;
            let (x, y, w, h) = placement(img.width, img.height);
            let mut content = Content::new();
            content.save_state();
            content.transform([w, 0.0, 0.0, h, x, y]);
            content.x_object(IMAGE_NAME);
            content.restore_state();
            if self.options.footer {
                let footer = format!("{}-{}", number, self.images_placed);
                write_text(&mut content, FONT_REGULAR, 7.0, PAGE_WIDTH / 2.0 - 20.0, 8.0, &footer);
            }
            self.push_page(
                PageKind::Content {
                    chapter: number.clone(),
                    page_index: self.images_placed,
                },
                content,
                Some(image_id),
            );
        }
        debug!(
            "chapter {}: {} of {} images placed",
            number,
            prepared.len(),
            outcomes.len()
        );
        prepared.len()
    }

    /// Pages written so far.
    pub fn pages(&self) -> &[PageKind] {
        &self.pages
    }

    /// Close the page tree and serialize the document.
    pub fn finish(mut self) -> Result<AssembledDocument, AssemblyError> {
        if self.chapters_added == 0 {
            return Err(AssemblyError::NoChapters);
        }
        let count = self.page_refs.len() as i32;
        self.pdf
            .pages(self.page_tree)
            .kids(self.page_refs.iter().copied())
            .count(count);
        Ok(AssembledDocument {
            bytes: self.pdf.finish(),
            pages: self.pages,
        })
    }
}

/// Assemble a whole document in one call.
pub fn assemble(
    title: &str,
    chapters: &[(ChapterRecord, Vec<FetchOutcome>)],
    options: AssemblyOptions,
) -> Result<AssembledDocument, AssemblyError> {
    let mut assembler = Assembler::new(title, chapters.len(), options);
    for (chapter, outcomes) in chapters {
        assembler.add_chapter(chapter, outcomes);
    }
    assembler.finish()
}
