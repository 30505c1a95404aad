use pagefit::fitting::{fit, fit_with_mode, FitMode, PageGeometry, RasterImage};
use rand::Rng as _;

const SAMPLES: usize = 2000;
const EPSILON: f64 = 1e-9;

fn random_input(rng: &mut rand::rngs::ThreadRng) -> (RasterImage, PageGeometry, f64) {
    let width = rng.gen_range(1..=4000);
    let image = RasterImage::new(width, rng.gen_range(1..=width * 20));
    let page = PageGeometry::new(rng.gen_range(50.0..1200.0), rng.gen_range(50.0..1200.0));
    let pixel_to_unit = rng.gen_range(0.01..2.0);
    (image, page, pixel_to_unit)
}

#[test]
fn contained_images_fit_on_a_single_page() {
    let mut rng = rand::thread_rng();

    for _ in 0..SAMPLES {
        let (image, page, pixel_to_unit) = random_input(&mut rng);
        let fit_result = fit(image, page, pixel_to_unit).unwrap();

        let physical_width = image.width as f64 * pixel_to_unit;
        let physical_height = image.height as f64 * pixel_to_unit;
        let expected_scale =
            (page.page_width / physical_width).min(page.page_height / physical_height);

        assert!(fit_result.scale > 0.0);
        assert!((fit_result.scale - expected_scale).abs() <= expected_scale * EPSILON);
        assert!(fit_result.rendered_width <= page.page_width * (1.0 + EPSILON));
        assert!(fit_result.rendered_height <= page.page_height * (1.0 + EPSILON));
        assert!(fit_result.x_offset >= -page.page_width * EPSILON);
        assert_eq!(fit_result.page_count, 1, "{:?}", fit_result);

        let rendered_ratio = fit_result.rendered_width / fit_result.rendered_height;
        let source_ratio = physical_width / physical_height;
        assert!((rendered_ratio - source_ratio).abs() <= source_ratio * 1e-9);
    }
}

#[test]
fn width_fitted_images_are_split_into_contiguous_pages() {
    let mut rng = rand::thread_rng();

    for _ in 0..SAMPLES {
        let (image, page, pixel_to_unit) = random_input(&mut rng);
        let fit_result = fit_with_mode(image, page, pixel_to_unit, FitMode::FitWidth).unwrap();

        assert!((fit_result.rendered_width - page.page_width).abs() <= page.page_width * EPSILON);
        assert!(fit_result.page_count >= 1);
        assert!(
            fit_result.rendered_height
                <= page.page_height * fit_result.page_count as f64 * (1.0 + EPSILON)
        );
        if fit_result.rendered_height <= page.page_height {
            assert_eq!(fit_result.page_count, 1);
        }

        let placements = fit_result.placements();
        assert_eq!(placements.len(), fit_result.page_count);
        for (page_index, placement) in placements.iter().enumerate() {
            assert_eq!(placement.page_index, page_index);
            assert_eq!(placement.y, -(page.page_height * page_index as f64));
            assert_eq!(placement.height, fit_result.rendered_height);
        }

        let pixel_slices = fit_result.pixel_slices();
        assert!(pixel_slices.len() >= fit_result.page_count);
        let mut next_row = 0;
        for (page_index, pixel_slice) in pixel_slices.iter().enumerate() {
            assert_eq!(pixel_slice.page_index, page_index);
            assert_eq!(pixel_slice.top, next_row);
            assert!(pixel_slice.height >= 1);
            next_row += pixel_slice.height;

            if fit_result.rows_per_page() > 0 {
                let slice_placement = fit_result.slice_placement(pixel_slice);
                assert!(
                    slice_placement.height <= page.page_height * (1.0 + EPSILON),
                    "{:?} is drawn {} mm tall on a {} mm page",
                    pixel_slice,
                    slice_placement.height,
                    page.page_height
                );
            }
        }
        assert_eq!(next_row, image.height);
    }
}

#[test]
fn identical_inputs_give_identical_results() {
    let mut rng = rand::thread_rng();

    for _ in 0..100 {
        let (image, page, pixel_to_unit) = random_input(&mut rng);
        similar_asserts::assert_eq!(
            fit(image, page, pixel_to_unit).unwrap(),
            fit(image, page, pixel_to_unit).unwrap()
        );
    }
}
