use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use unicode_normalization::UnicodeNormalization as _;

use crate::{
    error::ContextError,
    fitting::{self, FitMode, FitResult, PIXELS_TO_MILLIMETERS},
    page_format::{Orientation, PageFormat},
    pdf::{DocumentInfo, DocumentWriter, PdfDocument},
    raster::{ImageEncoding, RasterSnapshot},
};

/// How a snapshot taller than one page is spread over the following pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlicingStrategy {
    /// Embed the image once and draw it on every page, shifted up by one page height
    /// per page and clipped to the page bounds.
    #[default]
    Shift,
    /// Embed only the rows visible on each page.
    Crop,
}

/// Which of the two outputs is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportPath {
    /// The document saved for the user to keep.
    Download,
    /// A throwaway document opened for a quick look.
    Preview,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportProfile {
    pub image_encoding: ImageEncoding,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfiguration {
    pub page_format: PageFormat,
    pub orientation: Orientation,
    /// Physical size of one CSS pixel, in millimeters.
    pub pixel_to_unit: f64,
    /// Number of snapshot pixels per CSS pixel, the device scale used while capturing.
    pub device_scale: f64,
    pub fit_mode: FitMode,
    pub slicing: SlicingStrategy,
    /// RGB color transparent snapshots are flattened onto.
    pub background: [u8; 3],
    pub title: String,
    pub author: String,
    pub download: ExportProfile,
    pub preview: ExportProfile,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        ExportConfiguration {
            page_format: PageFormat::A4,
            orientation: Orientation::Portrait,
            pixel_to_unit: PIXELS_TO_MILLIMETERS,
            device_scale: 1.0,
            fit_mode: FitMode::Contain,
            slicing: SlicingStrategy::Shift,
            background: [255, 255, 255],
            title: "Itinerary".into(),
            author: "Unknown".into(),
            download: ExportProfile {
                image_encoding: ImageEncoding::Jpeg { quality: 95 },
            },
            preview: ExportProfile {
                image_encoding: ImageEncoding::Lossless,
            },
        }
    }
}

impl ExportConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;
        let configuration: ExportConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;

        Ok(configuration)
    }

    pub fn profile(&self, export_path: ExportPath) -> ExportProfile {
        match export_path {
            ExportPath::Download => self.download,
            ExportPath::Preview => self.preview,
        }
    }

    /// The physical size of one snapshot pixel.
    pub fn effective_pixel_to_unit(&self) -> f64 {
        self.pixel_to_unit / self.device_scale
    }
}

/// Turns snapshots into paginated PDF documents. Downloads and previews go through
/// the very same pages-building code and only differ in their profile.
pub struct Exporter {
    configuration: ExportConfiguration,
}

impl Exporter {
    pub fn new(configuration: ExportConfiguration) -> Self {
        Exporter { configuration }
    }

    pub fn configuration(&self) -> &ExportConfiguration {
        &self.configuration
    }

    /// Computes where the snapshot lands on the configured pages without producing anything.
    pub fn plan(&self, snapshot: &RasterSnapshot) -> Result<FitResult, ContextError> {
        let page = self
            .configuration
            .page_format
            .geometry(self.configuration.orientation);
        fitting::fit_with_mode(
            snapshot.dimensions(),
            page,
            self.configuration.effective_pixel_to_unit(),
            self.configuration.fit_mode,
        )
        .map_err(|error| ContextError::with_error("Unable to fit the snapshot onto the page", &error))
    }

    /// Adds the pages of the snapshot to `writer` and draws the snapshot on them.
    ///
    /// The snapshot is first flattened onto the configured background, then fitted
    /// onto the configured page geometry. With [`SlicingStrategy::Shift`] the image is
    /// embedded a single time and drawn on each of the `page_count` pages, shifted up
    /// by one page height per page and clipped to the page. With
    /// [`SlicingStrategy::Crop`] every page receives its own image holding only the
    /// whole rows that fit on it, which can take one page more than shifting. A
    /// snapshot whose single rows are taller than a page cannot be cropped and is
    /// shifted instead.
    ///
    /// The returned fit result describes the geometry shared by every page.
    pub fn write_pages<W: DocumentWriter>(
        &self,
        writer: &mut W,
        snapshot: &RasterSnapshot,
        profile: ExportProfile,
    ) -> Result<FitResult, ContextError> {
        let flattened_snapshot = snapshot.flatten_onto(self.configuration.background);
        let fit_result = self.plan(&flattened_snapshot)?;

        let slicing = match self.configuration.slicing {
            SlicingStrategy::Crop if fit_result.rows_per_page() == 0 => {
                log::warn!(
                    "A single row of the snapshot is taller than a page, shifting the whole image instead of cropping it"
                );
                SlicingStrategy::Shift
            }
            slicing => slicing,
        };

        match slicing {
            SlicingStrategy::Shift => {
                // Embed the image once, every page refers to the same XObject
                let encoded_image = flattened_snapshot.encode(profile.image_encoding)?;
                let image_handle = writer.add_image(&encoded_image)?;
                for placement in fit_result.placements() {
                    let page_index = writer.add_page(fit_result.page);
                    writer.place_image(page_index, &image_handle, &placement, true)?;
                }
            }
            SlicingStrategy::Crop => {
                let pixel_slices = fit_result.pixel_slices();
                log::debug!(
                    "Cropping the snapshot into {} slice(s) of at most {} rows",
                    pixel_slices.len(),
                    fit_result.rows_per_page()
                );
                for slice in pixel_slices {
                    // Construct the image of the rows of this page only
                    let slice_snapshot = flattened_snapshot.crop_rows(&slice)?;
                    let encoded_image = slice_snapshot.encode(profile.image_encoding)?;
                    let image_handle = writer.add_image(&encoded_image)?;
                    // The slice is never taller than the page, nothing needs clipping
                    let page_index = writer.add_page(fit_result.page);
                    writer.place_image(
                        page_index,
                        &image_handle,
                        &fit_result.slice_placement(&slice),
                        false,
                    )?;
                }
            }
        }

        Ok(fit_result)
    }

    /// Builds the finished PDF document for the given export path.
    ///
    /// The pages are written with the profile of `export_path`, so the download and
    /// the preview only differ in how the image is encoded. The document is then
    /// given its information dictionary, written out with a unique instance ID and
    /// optimized, ready to be saved with [`PdfDocument::save_to_file`] or
    /// [`PdfDocument::save_to_bytes`].
    pub fn build_document(
        &self,
        snapshot: &RasterSnapshot,
        export_path: ExportPath,
        document_identifier: String,
    ) -> Result<PdfDocument, ContextError> {
        let mut pdf_document = PdfDocument::new(document_identifier);
        let fit_result = self.write_pages(
            &mut pdf_document,
            snapshot,
            self.configuration.profile(export_path),
        )?;
        log::info!(
            "Laid out the snapshot over {} page(s) at scale {:.4} for the {:?} path",
            pdf_document.page_count(),
            fit_result.scale,
            export_path
        );

        // Construct the information dictionary from the configuration
        let now = OffsetDateTime::now_utc();
        pdf_document.set_info(DocumentInfo {
            title: self.configuration.title.clone(),
            author: self.configuration.author.clone(),
            creator: "pagefit".into(),
            subject: "Itinerary".into(),
            keywords: String::new(),
            creation_date: now,
        });
        // The creation time doubles as the instance ID of the document
        pdf_document.write_all(now.unix_timestamp_nanos().to_string())?;
        pdf_document.optimize();

        Ok(pdf_document)
    }

    /// Saves the download document to `output_path`.
    pub fn export(
        &self,
        snapshot: &RasterSnapshot,
        output_path: &Path,
    ) -> Result<PathBuf, ContextError> {
        let document_identifier = output_path
            .file_stem()
            .map(|file_stem| file_stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let mut pdf_document =
            self.build_document(snapshot, ExportPath::Download, document_identifier)?;
        pdf_document.save_to_file(output_path)?;
        log::info!("Saved the PDF document to {:?}", output_path);

        Ok(output_path.to_path_buf())
    }

    /// Saves the preview document into the temporary directory and returns its path.
    pub fn write_preview(&self, snapshot: &RasterSnapshot) -> Result<PathBuf, ContextError> {
        let preview_path = std::env::temp_dir().join(format!(
            "pagefit-preview-{}-{}.pdf",
            std::process::id(),
            OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let mut pdf_document =
            self.build_document(snapshot, ExportPath::Preview, "preview".into())?;
        pdf_document.save_to_file(&preview_path)?;
        log::debug!("Saved the preview document to {:?}", preview_path);

        Ok(preview_path)
    }

    /// Writes the preview document and opens it with the platform's default viewer.
    pub fn preview(&self, snapshot: &RasterSnapshot) -> Result<PathBuf, ContextError> {
        let preview_path = self.write_preview(snapshot)?;
        open_with_system_viewer(&preview_path)?;

        Ok(preview_path)
    }
}

/// The file name of an exported itinerary, `<Destination>_Itinerary_<Customer_Name>.pdf`.
///
/// Blank values fall back to `Destination` and `Customer`. Whitespace runs in the
/// customer name become underscores and path separators are never emitted.
pub fn itinerary_file_name(destination: &str, customer_name: &str) -> String {
    let destination = destination.nfc().collect::<String>();
    let customer_name = customer_name.nfc().collect::<String>();

    let destination = if destination.trim().is_empty() {
        "Destination".to_string()
    } else {
        destination.trim().to_string()
    };
    let customer_name = if customer_name.trim().is_empty() {
        "Customer".to_string()
    } else {
        customer_name.split_whitespace().collect::<Vec<_>>().join("_")
    };

    format!("{}_Itinerary_{}.pdf", destination, customer_name).replace(['/', '\\'], "-")
}

/// Opens a file with the viewer the operating system associates with it.
pub fn open_with_system_viewer(file_path: &Path) -> Result<(), ContextError> {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = std::process::Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        std::process::Command::new("xdg-open")
    };

    // The viewer keeps running on its own, there is nothing to wait for
    command.arg(file_path).spawn().map_err(|error| {
        ContextError::with_error(
            format!("Unable to open {:?} with the system viewer", file_path),
            &error,
        )
    })?;

    Ok(())
}
