use serde::{Deserialize, Serialize};

/// Millimeters covered by one CSS pixel at the reference density of 96 DPI.
pub const PIXELS_TO_MILLIMETERS: f64 = 0.264583;

/// Relative slack applied when counting pages, so that an image whose scaled height
/// meets the page boundary exactly is not split because of floating-point overshoot.
const PAGE_COUNT_TOLERANCE: f64 = 1e-9;

/// The dimensions of a rendered snapshot, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
}

impl RasterImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The physical size of one output page, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
}

impl PageGeometry {
    pub fn new(page_width: f64, page_height: f64) -> Self {
        Self {
            page_width,
            page_height,
        }
    }
}

/// How the scale factor is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitMode {
    /// Scale so that the whole image fits within one page on both axes.
    #[default]
    Contain,
    /// Scale so that the image spans the page width, letting the height flow
    /// over as many pages as needed.
    FitWidth,
}

/// The input that made a fitting computation fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitError {
    /// A dimension or the conversion constant was zero, negative or not finite.
    InvalidDimension {
        dimension: &'static str,
        value: f64,
    },
}

impl std::fmt::Display for FitError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::InvalidDimension { dimension, value } => write!(
                formatter,
                "Invalid dimension: {} must be positive, got {}",
                dimension, value
            ),
        }
    }
}

impl std::error::Error for FitError {}

/// The outcome of fitting a raster image onto a page format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitResult {
    /// Uniform factor applied to both axes of the physical image size.
    pub scale: f64,
    pub rendered_width: f64,
    pub rendered_height: f64,
    /// Horizontal offset which centers the image on the page.
    pub x_offset: f64,
    pub page_count: usize,
    pub page: PageGeometry,
    pub source: RasterImage,
}

/// Where the image is drawn on one page, in millimeters from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePlacement {
    pub page_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The rows of the source image which become visible on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelSlice {
    pub page_index: usize,
    pub top: u32,
    pub height: u32,
}

/// Fits the image within a single page, preserving its aspect ratio.
pub fn fit(
    image: RasterImage,
    page: PageGeometry,
    pixel_to_unit: f64,
) -> Result<FitResult, FitError> {
    fit_with_mode(image, page, pixel_to_unit, FitMode::Contain)
}

/// Computes the scale, centering offset and page count of `image` on `page`.
///
/// `pixel_to_unit` converts pixels into the unit of the page geometry
/// (see [`PIXELS_TO_MILLIMETERS`]).
pub fn fit_with_mode(
    image: RasterImage,
    page: PageGeometry,
    pixel_to_unit: f64,
    mode: FitMode,
) -> Result<FitResult, FitError> {
    ensure_positive("image width", image.width as f64)?;
    ensure_positive("image height", image.height as f64)?;
    ensure_positive("page width", page.page_width)?;
    ensure_positive("page height", page.page_height)?;
    ensure_positive("pixel to unit", pixel_to_unit)?;

    let physical_width = image.width as f64 * pixel_to_unit;
    let physical_height = image.height as f64 * pixel_to_unit;

    let width_ratio = page.page_width / physical_width;
    let scale = match mode {
        FitMode::Contain => width_ratio.min(page.page_height / physical_height),
        FitMode::FitWidth => width_ratio,
    };

    let rendered_width = physical_width * scale;
    let rendered_height = physical_height * scale;
    let x_offset = (page.page_width - rendered_width) / 2.0;

    let pages = rendered_height / page.page_height;
    let page_count = ((pages - pages * PAGE_COUNT_TOLERANCE).ceil() as usize).max(1);

    log::debug!(
        "Fitted a {}x{} px image onto a {}x{} mm page with scale {:.6} ({} page(s))",
        image.width,
        image.height,
        page.page_width,
        page.page_height,
        scale,
        page_count
    );

    Ok(FitResult {
        scale,
        rendered_width,
        rendered_height,
        x_offset,
        page_count,
        page,
        source: image,
    })
}

fn ensure_positive(dimension: &'static str, value: f64) -> Result<(), FitError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FitError::InvalidDimension { dimension, value })
    }
}

impl FitResult {
    /// One placement per page: the whole rendered image, shifted upwards by one
    /// page height for every page after the first.
    pub fn placements(&self) -> Vec<PagePlacement> {
        (0..self.page_count)
            .map(|page_index| PagePlacement {
                page_index,
                x: self.x_offset,
                y: -(self.page.page_height * page_index as f64),
                width: self.rendered_width,
                height: self.rendered_height,
            })
            .collect()
    }

    /// The number of whole source rows that fit in the height of one page.
    ///
    /// Zero when a single source row is taller than a page, in which case the
    /// image cannot be cropped without cutting rows apart.
    pub fn rows_per_page(&self) -> u32 {
        let rows_per_page =
            self.page.page_height * self.source.height as f64 / self.rendered_height;
        (rows_per_page + rows_per_page * PAGE_COUNT_TOLERANCE).floor() as u32
    }

    /// The source rows drawn on each page when the image is cropped instead of shifted.
    ///
    /// Every slice but the last holds exactly [`FitResult::rows_per_page`] rows, so
    /// a slice drawn with [`FitResult::slice_placement`] never runs past the bottom
    /// of its page. The slices are contiguous and cover every source row exactly
    /// once. Because only whole rows are kept on a page, there can be more slices
    /// than [`FitResult::page_count`] when a page holds a fractional number of rows.
    /// When a single row is taller than a page each slice holds one row.
    pub fn pixel_slices(&self) -> Vec<PixelSlice> {
        let source_height = self.source.height;
        let rows_per_slice = self.rows_per_page().min(source_height).max(1);

        (0..source_height)
            .step_by(rows_per_slice as usize)
            .enumerate()
            .map(|(page_index, top)| PixelSlice {
                page_index,
                top,
                height: rows_per_slice.min(source_height - top),
            })
            .collect()
    }

    /// Where a cropped slice is drawn: top-aligned on its own page, at the same
    /// scale as the full image.
    pub fn slice_placement(&self, slice: &PixelSlice) -> PagePlacement {
        let millimeters_per_row = self.rendered_height / self.source.height as f64;
        PagePlacement {
            page_index: slice.page_index,
            x: self.x_offset,
            y: 0.0,
            width: self.rendered_width,
            height: slice.height as f64 * millimeters_per_row,
        }
    }
}
