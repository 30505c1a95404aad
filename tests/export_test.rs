use image::{DynamicImage, Rgba, RgbaImage};
use lopdf::Object;
use pagefit::{
    export::{ExportConfiguration, ExportPath, Exporter, SlicingStrategy},
    fitting::FitMode,
    page_format::PageFormat,
    raster::{ImageEncoding, RasterSnapshot},
};
use std::path::PathBuf;

/// A snapshot with a horizontal band of a different color on every 100 rows.
fn striped_snapshot(width: u32, height: u32) -> RasterSnapshot {
    let rgba_image = RgbaImage::from_fn(width, height, |_, y| {
        let band = (y / 100) as u8;
        Rgba([band.wrapping_mul(40), 255 - band.wrapping_mul(20), 128, 255])
    });
    RasterSnapshot::from_image(DynamicImage::ImageRgba8(rgba_image))
}

fn temporary_path(file_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pagefit-{}-{}", std::process::id(), file_name))
}

fn paginated_configuration(slicing: SlicingStrategy) -> ExportConfiguration {
    ExportConfiguration {
        page_format: PageFormat::Custom {
            width: 100.0,
            height: 100.0,
        },
        pixel_to_unit: 0.25,
        fit_mode: FitMode::FitWidth,
        slicing,
        ..ExportConfiguration::default()
    }
}

fn image_streams(document: &lopdf::Document) -> Vec<&lopdf::Stream> {
    document
        .objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream) => Some(stream),
            _ => None,
        })
        .filter(|stream| {
            matches!(
                stream.dict.get(b"Subtype").and_then(|subtype| subtype.as_name()),
                Ok(b"Image")
            )
        })
        .collect()
}

#[test]
fn shifted_export_embeds_the_image_once() {
    // 400 px at 0.25 mm span the 100 mm width, 1000 px become 250 mm, so three pages
    let exporter = Exporter::new(paginated_configuration(SlicingStrategy::Shift));
    let output_path = temporary_path("shifted.pdf");

    let written_path = exporter
        .export(&striped_snapshot(400, 1000), &output_path)
        .unwrap();
    assert_eq!(written_path, output_path);

    let document = lopdf::Document::load(&output_path).unwrap();
    assert_eq!(document.get_pages().len(), 3);

    let images = image_streams(&document);
    assert_eq!(images.len(), 1);
    assert_eq!(
        images[0].dict.get(b"Filter").unwrap().as_name().unwrap(),
        b"DCTDecode"
    );
    assert_eq!(images[0].dict.get(b"Height").unwrap().as_i64().unwrap(), 1000);

    std::fs::remove_file(output_path).unwrap();
}

#[test]
fn cropped_export_embeds_one_slice_per_page() {
    let exporter = Exporter::new(paginated_configuration(SlicingStrategy::Crop));
    let output_path = temporary_path("cropped.pdf");

    exporter
        .export(&striped_snapshot(400, 1000), &output_path)
        .unwrap();

    let document = lopdf::Document::load(&output_path).unwrap();
    assert_eq!(document.get_pages().len(), 3);

    let mut slice_heights: Vec<i64> = image_streams(&document)
        .iter()
        .map(|stream| stream.dict.get(b"Height").unwrap().as_i64().unwrap())
        .collect();
    slice_heights.sort_unstable();
    assert_eq!(slice_heights, vec![200, 400, 400]);

    std::fs::remove_file(output_path).unwrap();
}

#[test]
fn cropped_slices_are_drawn_inside_their_pages() {
    // 77.7 mm pages hold 310.8 rows, only whole rows are kept on each page
    let configuration = ExportConfiguration {
        page_format: PageFormat::Custom {
            width: 100.0,
            height: 77.7,
        },
        ..paginated_configuration(SlicingStrategy::Crop)
    };
    let pdf_document_bytes = Exporter::new(configuration)
        .build_document(
            &striped_snapshot(400, 1000),
            ExportPath::Download,
            "cropped".into(),
        )
        .unwrap()
        .save_to_bytes()
        .unwrap();

    let document = lopdf::Document::load_mem(&pdf_document_bytes).unwrap();
    let pages = document.get_pages();
    assert_eq!(pages.len(), 4);

    let mut slice_heights: Vec<i64> = image_streams(&document)
        .iter()
        .map(|stream| stream.dict.get(b"Height").unwrap().as_i64().unwrap())
        .collect();
    slice_heights.sort_unstable();
    assert_eq!(slice_heights, vec![70, 310, 310, 310]);

    for page_id in pages.values() {
        let media_box = document
            .get_dictionary(*page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap();
        let page_height = media_box[3].as_float().unwrap();

        let content =
            lopdf::content::Content::decode(&document.get_page_content(*page_id).unwrap())
                .unwrap();
        let transform = content
            .operations
            .iter()
            .find(|operation| operation.operator == "cm")
            .unwrap();
        let drawn_height = transform.operands[3].as_float().unwrap();
        let drawn_bottom = transform.operands[5].as_float().unwrap();
        assert!(drawn_bottom >= -1e-3, "the slice starts below the page");
        assert!(drawn_bottom + drawn_height <= page_height + 1e-3);
    }
}

#[test]
fn saving_into_a_missing_directory_fails() {
    let exporter = Exporter::new(ExportConfiguration::default());
    let output_path = temporary_path("missing-directory").join("itinerary.pdf");

    let error = exporter
        .export(&striped_snapshot(20, 20), &output_path)
        .unwrap_err();
    assert!(error.context.contains("Failed to create the output file"));
    assert!(!output_path.exists());
}

#[test]
fn preview_uses_the_lossless_profile() {
    let exporter = Exporter::new(ExportConfiguration::default());
    let snapshot = striped_snapshot(300, 600);

    let preview_path = exporter.write_preview(&snapshot).unwrap();
    let document = lopdf::Document::load(&preview_path).unwrap();
    assert_eq!(document.get_pages().len(), 1);

    let images = image_streams(&document);
    assert_eq!(images.len(), 1);
    assert_eq!(
        images[0].dict.get(b"Filter").unwrap().as_name().unwrap(),
        b"FlateDecode"
    );
    assert_eq!(
        exporter.configuration().profile(ExportPath::Preview).image_encoding,
        ImageEncoding::Lossless
    );

    std::fs::remove_file(preview_path).unwrap();
}

#[test]
fn snapshots_round_trip_through_png_files() {
    let snapshot_path = temporary_path("snapshot.png");
    striped_snapshot(120, 340)
        .image()
        .save(&snapshot_path)
        .unwrap();

    let snapshot = RasterSnapshot::from_path(&snapshot_path).unwrap();
    let fit_result = Exporter::new(ExportConfiguration::default())
        .plan(&snapshot)
        .unwrap();
    assert_eq!(fit_result.source.width, 120);
    assert_eq!(fit_result.source.height, 340);
    assert_eq!(fit_result.page_count, 1);

    std::fs::remove_file(snapshot_path).unwrap();
    assert!(RasterSnapshot::from_path(&temporary_path("missing.png")).is_err());
}

#[test]
fn invalid_configuration_is_reported_with_context() {
    let configuration = ExportConfiguration {
        device_scale: 0.0,
        ..ExportConfiguration::default()
    };
    let error = Exporter::new(configuration)
        .plan(&striped_snapshot(10, 10))
        .unwrap_err();

    assert_eq!(error.context, "Unable to fit the snapshot onto the page");
    assert!(error
        .source_error
        .unwrap()
        .contains("pixel to unit must be positive"));
}

#[test]
fn configuration_is_read_from_json_files() {
    let configuration_path = temporary_path("configuration.json");
    std::fs::write(
        &configuration_path,
        r#"{ "pageFormat": "letter", "title": "Bali" }"#,
    )
    .unwrap();

    let configuration = ExportConfiguration::from_path(&configuration_path).unwrap();
    assert_eq!(configuration.page_format, PageFormat::Letter);
    assert_eq!(configuration.title, "Bali");

    std::fs::write(&configuration_path, "{ not json").unwrap();
    assert!(ExportConfiguration::from_path(&configuration_path).is_err());

    std::fs::remove_file(configuration_path).unwrap();
}
