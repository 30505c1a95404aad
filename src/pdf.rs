use lopdf::{content::Operation, Object};
use nalgebra_glm as glm;
use std::{
    collections::BTreeMap,
    io::{BufWriter, Write as _},
    mem,
    path::Path,
};
use time::OffsetDateTime;

use crate::{
    error::ContextError,
    fitting::{PageGeometry, PagePlacement},
    raster::{EncodedImage, ImageEncoding},
};

/// Anything able to assemble pages out of placed images.
///
/// The export pipeline only talks to this trait, so the fitting arithmetic never
/// depends on how the output artifact is actually produced.
pub trait DocumentWriter {
    type ImageHandle;

    /// Appends a new blank page and returns its index.
    fn add_page(&mut self, page: PageGeometry) -> usize;

    /// Stores the image once in the document, so that it can be placed on any page.
    fn add_image(&mut self, image: &EncodedImage) -> Result<Self::ImageHandle, ContextError>;

    /// Draws a stored image on a page. With `clip_to_page` every part of the image
    /// falling outside of the page bounds is cut away.
    fn place_image(
        &mut self,
        page_index: usize,
        image: &Self::ImageHandle,
        placement: &PagePlacement,
        clip_to_page: bool,
    ) -> Result<(), ContextError>;
}

/// The name under which an image XObject is registered, together with its object ID.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReference {
    pub name: String,
    pub object_id: lopdf::ObjectId,
}

/// The metadata stored in the `Info` dictionary of the document.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub author: String,
    pub creator: String,
    pub subject: String,
    pub keywords: String,
    pub creation_date: OffsetDateTime,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        DocumentInfo {
            title: "Unknown".into(),
            author: "Unknown".into(),
            creator: "Unknown".into(),
            subject: "Unknown".into(),
            keywords: String::new(),
            creation_date: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

/// One page of the document, its size is stored in points.
#[derive(Debug, Clone)]
pub struct PdfPage {
    pub(crate) number: usize,
    pub width: f32,
    pub height: f32,
    pub(crate) operations: Vec<Operation>,
    /// The image XObjects drawn on this page, keyed by their resource name.
    pub(crate) xobjects: BTreeMap<String, lopdf::ObjectId>,
}

impl PdfPage {
    /// Encodes the page operations into an uncompressed content stream.
    fn content_stream(&self) -> Result<lopdf::Stream, ContextError> {
        let stream_content = lopdf::content::Content {
            operations: self.operations.clone(),
        };
        let encoded_content = stream_content.encode().map_err(|error| {
            ContextError::with_error(
                format!("Failed to encode the content of page {}", self.number),
                &error,
            )
        })?;

        Ok(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content).with_compression(false))
    }

    fn resources(&self) -> lopdf::Dictionary {
        let mut resources = lopdf::Dictionary::new();
        if !self.xobjects.is_empty() {
            let xobjects: lopdf::Dictionary = self
                .xobjects
                .iter()
                .map(|(name, object_id)| (name.clone(), Object::Reference(*object_id)))
                .collect();
            resources.set("XObject", Object::Dictionary(xobjects));
        }
        resources
    }
}

/// Converts millimeters to points because this is what PDF user space is measured in.
pub fn millimeters_to_points(millimeters: f64) -> f32 {
    (millimeters * 2.834646) as f32
}

/// The affine matrix mapping the unit square onto the placement rectangle, in
/// points and with the origin at the bottom-left corner of a page `page_height` points tall.
fn placement_matrix(placement: &PagePlacement, page_height: f32) -> glm::Mat3 {
    let width = millimeters_to_points(placement.width);
    let height = millimeters_to_points(placement.height);
    let x = millimeters_to_points(placement.x);
    let y = page_height - millimeters_to_points(placement.y) - height;

    glm::translation2d(&glm::vec2(x, y)) * glm::scaling2d(&glm::vec2(width, height))
}

pub struct PdfDocument {
    pub inner_document: lopdf::Document,
    pub identifier: String,
    pub(crate) pages: Vec<PdfPage>,
    info: DocumentInfo,
    image_count: usize,
    written: bool,
}

impl PdfDocument {
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
            info: DocumentInfo::default(),
            image_count: 0,
            written: false,
        }
    }

    pub fn set_info(&mut self, info: DocumentInfo) {
        self.info = info;
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Write the pages placed so far into the inner `lopdf` document and finalize it.
    ///
    /// This assembles the information dictionary, the catalog, one page dictionary
    /// (with its resources and content stream) per page, the page tree and the
    /// trailer. The `instance_id` becomes the second entry of the trailer `ID`, the
    /// first one being the document identifier.
    ///
    /// A document can only be written once and must hold at least one page. The
    /// output is not optimized, call [`PdfDocument::optimize`] before saving it.
    pub fn write_all(&mut self, instance_id: String) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        if self.written {
            return Err(ContextError::with_context(format!(
                "The PDF document {:?} has already been written",
                self.identifier
            )));
        }
        if self.pages.is_empty() {
            return Err(ContextError::with_context(
                "Unable to write a PDF document without pages",
            ));
        }

        // Construct the general info of the document from its metadata
        let literal = |text: &str| String(text.as_bytes().to_vec(), Literal);
        let timestamp = to_pdf_timestamp_format(&self.info.creation_date);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            ("CreationDate", literal(&timestamp)),
            ("ModDate", literal(&timestamp)),
            ("Title", literal(&self.info.title)),
            ("Author", literal(&self.info.author)),
            ("Creator", literal(&self.info.creator)),
            ("Producer", literal(concat!("pagefit ", env!("CARGO_PKG_VERSION")))),
            ("Subject", literal(&self.info.subject)),
            ("Identifier", literal(&self.identifier)),
            ("Keywords", literal(&self.info.keywords)),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        // The pages dictionary is referenced by every page, so its ID is reserved first
        let pages_id = self.inner_document.new_object_id();
        // Construct the catalog, which points to the page tree
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        // Construct every page, all the boxes span the whole page
        let mut page_ids = Vec::<lopdf::Object>::new();
        for page in self.pages.iter() {
            let page_box =
                || Array(vec![Integer(0), Integer(0), Real(page.width), Real(page.height)]);
            let mut page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                ("MediaBox", page_box()),
                ("TrimBox", page_box()),
                ("CropBox", page_box()),
                ("Parent", Reference(pages_id)),
            ]);

            // Only the images drawn on this page are listed in its resources
            let resources_id = self
                .inner_document
                .add_object(Dictionary(page.resources()));
            page_dictionary.set("Resources", Reference(resources_id));

            let content_id = self.inner_document.add_object(page.content_stream()?);
            page_dictionary.set("Contents", Reference(content_id));

            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Reference(page_id));
        }

        // Construct the page tree under the ID reserved by the catalog
        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(self.pages.len() as i64)),
            ("Kids", Array(page_ids)),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        // Finalize the document by filling the trailer
        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.into_bytes(), Literal),
            ]),
        );
        self.written = true;

        Ok(())
    }

    /// Drops unreferenced objects and compresses every stream which allows it.
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.delete_zero_length_streams();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Saves the document to `pdf_file_path`, replacing any existing file.
    ///
    /// The buffered writer is flushed before returning, failing to write the last
    /// bytes (on a full disk for example) is an error.
    pub fn save_to_file(&mut self, pdf_file_path: &Path) -> Result<(), ContextError> {
        let pdf_file = std::fs::File::create(pdf_file_path).map_err(|error| {
            ContextError::with_error(
                format!("Failed to create the output file {:?}", pdf_file_path),
                &error,
            )
        })?;
        let mut writer = BufWriter::new(pdf_file);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error(
                format!("Failed to save the PDF document to {:?}", pdf_file_path),
                &error,
            )
        })?;
        writer.flush().map_err(|error| {
            ContextError::with_error(
                format!("Failed to flush the PDF document to {:?}", pdf_file_path),
                &error,
            )
        })?;

        Ok(())
    }

    fn get_mut_page(&mut self, page_index: usize) -> Result<&mut PdfPage, ContextError> {
        self.pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))
    }
}

impl DocumentWriter for PdfDocument {
    type ImageHandle = ImageReference;

    fn add_page(&mut self, page: PageGeometry) -> usize {
        self.pages.push(PdfPage {
            number: self.pages.len() + 1,
            width: millimeters_to_points(page.page_width),
            height: millimeters_to_points(page.page_height),
            operations: Vec::new(),
            xobjects: BTreeMap::new(),
        });

        self.pages.len() - 1
    }

    /// Embeds the image as an XObject named `X0`, `X1` and so on. JPEG data is
    /// stored as it is behind a `DCTDecode` filter, raw RGB samples are left to
    /// [`PdfDocument::optimize`] to compress.
    fn add_image(&mut self, image: &EncodedImage) -> Result<ImageReference, ContextError> {
        use lopdf::Object::*;

        // Raw samples must cover the whole image
        let expected_length = image.width as usize * image.height as usize * 3;
        if image.encoding == ImageEncoding::Lossless && image.bytes.len() != expected_length {
            return Err(ContextError::with_context(format!(
                "The raw image holds {} bytes but {}x{} RGB samples need {}",
                image.bytes.len(),
                image.width,
                image.height,
                expected_length
            )));
        }

        // Construct the image dictionary, the filter depends on the encoding
        let mut image_dictionary = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".into())),
            ("Subtype", Name("Image".into())),
            ("Width", Integer(image.width as i64)),
            ("Height", Integer(image.height as i64)),
            ("ColorSpace", Name("DeviceRGB".into())),
            ("BitsPerComponent", Integer(8)),
            ("Interpolate", Boolean(true)),
        ]);
        let image_stream = match image.encoding {
            ImageEncoding::Jpeg { .. } => {
                image_dictionary.set("Filter", Name("DCTDecode".into()));
                // The JPEG data is already compressed and must stay as it is
                lopdf::Stream::new(image_dictionary, image.bytes.clone()).with_compression(false)
            }
            ImageEncoding::Lossless => lopdf::Stream::new(image_dictionary, image.bytes.clone()),
        };

        let object_id = self.inner_document.add_object(image_stream);
        let name = format!("X{}", self.image_count);
        self.image_count += 1;
        log::trace!(
            "Embedded the {}x{} image {} as object {:?}",
            image.width,
            image.height,
            name,
            object_id
        );

        Ok(ImageReference { name, object_id })
    }

    /// Draws the image inside the placement rectangle of the page. The whole drawing
    /// is wrapped in `q`/`Q`, so the clipping path and the transformation never leak
    /// into what is drawn afterwards.
    fn place_image(
        &mut self,
        page_index: usize,
        image: &ImageReference,
        placement: &PagePlacement,
        clip_to_page: bool,
    ) -> Result<(), ContextError> {
        let page = self.get_mut_page(page_index)?;
        let (page_width, page_height) = (page.width, page.height);
        let matrix = placement_matrix(placement, page_height);

        let mut operations = vec![Operation::new("q", vec![])];
        // Intersect the clipping path with the page rectangle without painting it
        if clip_to_page {
            operations.extend([
                Operation::new(
                    "re",
                    vec![0.into(), 0.into(), page_width.into(), page_height.into()],
                ),
                Operation::new("W", vec![]),
                Operation::new("n", vec![]),
            ]);
        }
        // Map the unit square, where images are drawn, onto the placement
        operations.extend([
            Operation::new(
                "cm",
                vec![
                    matrix[(0, 0)].into(),
                    matrix[(1, 0)].into(),
                    matrix[(0, 1)].into(),
                    matrix[(1, 1)].into(),
                    matrix[(0, 2)].into(),
                    matrix[(1, 2)].into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image.name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);

        page.operations.extend(operations);
        page.xobjects.insert(image.name.clone(), image.object_id);

        Ok(())
    }
}

fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
