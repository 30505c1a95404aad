//! pagefit turns a rendered document snapshot, such as the screenshot of a travel itinerary,
//! into a paginated PDF document. The snapshot is scaled uniformly to fit the chosen paper size,
//! centered horizontally and, when taller than a page, spread over as many pages as needed.
//!
//! The geometry lives in `fitting` and is a pure computation, while `pdf` takes care of
//! producing the actual document and `export` glues the two together for the download
//! and the preview outputs.

/// The module where the fitting arithmetic is presented.
///
/// # Introduction
///
/// The entry point of this module is the `fit` function, which takes the pixel dimensions of a
/// snapshot (`RasterImage`), the physical size of a page (`PageGeometry`) and the size of a pixel
/// in the same physical unit, returning a `FitResult`. The result holds the uniform scale factor,
/// the size of the scaled image, the horizontal offset that centers it and the number of pages
/// it needs.
///
/// A `FitResult` can then be turned either into one `PagePlacement` per page, which draws the
/// whole image shifted upwards by one page height per page, or into `PixelSlice`s, which describe
/// the rows of the snapshot visible on each page for writers that prefer to crop the image.
pub mod fitting;

/// This module contains the `ContextError` type which is the error type used throughout this library,
/// except for the fitting computation which has its own `FitError`.
///
/// A `ContextError` always carries a sentence explaining what was being attempted and, when the
/// failure comes from another library, the message of the propagated error.
pub mod error;

/// The named paper sizes (`PageFormat`) and their `Orientation`.
pub mod page_format;

/// Loading, flattening, cropping and encoding of the snapshots through the `image` crate.
pub mod raster;

/// The module where the `PdfDocument` interface for writing PDF documents is presented.
///
/// # Introduction
///
/// `PdfDocument` implements the `DocumentWriter` trait: pages are added with `add_page`, images
/// are embedded once with `add_image` and drawn on any number of pages with `place_image`. When
/// all pages are ready, `write_all` assembles the page tree and the trailer, after which the
/// document can be saved with `save_to_bytes` or `save_to_file`.
///
/// All lengths given to the writer are in millimeters, measured from the top-left corner of the
/// page. They are converted to PDF points with the origin at the bottom-left corner internally.
pub mod pdf;

/// The export and preview paths together with their JSON configuration.
pub mod export;
