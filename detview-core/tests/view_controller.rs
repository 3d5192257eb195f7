use detview_core::{
    DetectionRecord, DisplayRect, ImageDimensions, ImageSource, ImageState, ThumbnailCropper,
    ViewController, ViewMessage, ViewportLayout,
};
use detview_utils::{AppSettings, ImageFormatHint, encode_rgba};
use image::{Rgba, RgbaImage};

fn png_source(width: u32, height: u32) -> ImageSource {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 255]));
    let bytes = encode_rgba(&image, ImageFormatHint::Png, 100).expect("encode fixture");
    ImageSource::new(bytes, "image/png").with_name("fixture.png")
}

fn controller_with_width(max_width: u32) -> ViewController {
    let mut settings = AppSettings::default();
    settings.viewport.max_width = max_width;
    ViewController::new(&settings).expect("controller")
}

/// Select `source` and run its decode inline.
fn load(controller: &mut ViewController, source: ImageSource) {
    let job = controller.select_file(source);
    assert!(controller.handle_message(job.run()));
}

fn face(x: f32, y: f32, width: f32, height: f32) -> DetectionRecord {
    DetectionRecord::new("happy", 0.9, x, y, width, height)
}

#[test]
fn scaled_display_maps_boxes_exactly() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(800, 600));

    assert_eq!(
        controller.image_state(),
        ImageState::Ready {
            native: ImageDimensions::new(800, 600)
        }
    );
    assert_eq!(controller.display_size(), Some(ImageDimensions::new(400, 300)));

    controller.set_detections(vec![face(100.0, 100.0, 200.0, 200.0)]);
    assert_eq!(
        controller.display_rects(),
        vec![DisplayRect { x: 50.0, y: 50.0, width: 100.0, height: 100.0 }]
    );
    let overlay = controller.overlay().expect("overlay");
    assert_eq!(overlay.dimensions(), (400, 300));
}

#[test]
fn overlay_is_idempotent_across_redraws() {
    let mut controller = controller_with_width(100);
    load(&mut controller, png_source(100, 80));
    let detections = vec![face(10.0, 30.0, 20.0, 20.0), face(50.0, 40.0, 30.0, 30.0)];

    controller.set_detections(detections.clone());
    let first = controller.overlay().expect("overlay").clone();
    controller.set_detections(detections);
    let second = controller.overlay().expect("overlay").clone();
    assert_eq!(first, second);

    controller.on_resize(ViewportLayout::new(100, None));
    assert_eq!(controller.overlay().expect("overlay"), &first);

    controller.clear_detections();
    assert!(controller.overlay().expect("overlay").pixels().all(|p| p[3] == 0));
}

#[test]
fn summaries_aggregate_counts_and_means() {
    let mut controller = controller_with_width(64);
    controller.set_detections(vec![
        DetectionRecord::new("a", 0.8, 0.0, 0.0, 1.0, 1.0),
        DetectionRecord::new("a", 0.6, 0.0, 0.0, 1.0, 1.0),
        DetectionRecord::new("b", 1.0, 0.0, 0.0, 1.0, 1.0),
    ]);

    let summary = controller.category_summary();
    assert_eq!(summary["a"].count, 2);
    assert!((summary["a"].mean_confidence() - 0.7).abs() < 1e-6);
    assert_eq!(summary["b"].count, 1);
    assert!((summary["b"].mean_confidence() - 1.0).abs() < 1e-9);
    assert_eq!(controller.count_label(), "3 detections");
    assert_eq!(controller.class_counts()["a"], 2);
}

#[test]
fn thumbnails_clip_to_image_bounds() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(40, 40));
    controller.set_detections(vec![face(-5.0, -5.0, 50.0, 50.0)]);

    let request = controller.take_pending_crop().expect("crop scheduled");
    let mut cropper = ThumbnailCropper::default();
    assert!(controller.handle_message(request.run(&mut cropper)));

    let thumbnail = controller.thumbnails().get(0).expect("thumbnail");
    assert_eq!(thumbnail.dimensions, ImageDimensions::new(50, 50));
    let pixels = image::load_from_memory(&thumbnail.bytes)
        .expect("decode")
        .to_rgba8();
    assert_eq!(pixels.get_pixel(0, 0)[3], 0);
    assert_eq!(pixels.get_pixel(5, 5), &Rgba([0, 0, 128, 255]));
    assert_eq!(pixels.get_pixel(44, 44), &Rgba([39, 39, 128, 255]));
    assert_eq!(pixels.get_pixel(49, 49)[3], 0);
}

#[test]
fn thumbnails_for_emptied_detections_are_discarded() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(40, 40));
    controller.set_detections(vec![face(1.0, 1.0, 10.0, 10.0)]);
    let request = controller.take_pending_crop().expect("crop scheduled");

    controller.clear_detections();
    assert!(controller.take_pending_crop().is_none());

    let mut cropper = ThumbnailCropper::default();
    let message = request.run(&mut cropper);
    assert!(matches!(
        &message,
        ViewMessage::ThumbnailsReady { thumbnails, .. } if thumbnails.len() == 1
    ));
    assert!(!controller.handle_message(message));
    assert!(controller.thumbnails().is_empty());
}

#[test]
fn decode_for_replaced_file_is_ignored() {
    let mut controller = controller_with_width(400);
    let stale = controller.select_file(png_source(10, 10));
    let fresh = controller.select_file(png_source(20, 20));
    assert_eq!(controller.registry().live_count(), 1);

    assert!(!controller.handle_message(stale.run()));
    assert!(matches!(controller.image_state(), ImageState::Loading { .. }));
    assert!(controller.handle_message(fresh.run()));
    assert_eq!(
        controller.image_state().native(),
        Some(ImageDimensions::new(20, 20))
    );
}

#[test]
fn new_file_resets_detections_and_thumbnails() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(30, 30));
    controller.set_detections(vec![face(0.0, 0.0, 10.0, 10.0)]);
    let request = controller.take_pending_crop().expect("crop scheduled");
    let mut cropper = ThumbnailCropper::default();
    assert!(controller.handle_message(request.run(&mut cropper)));
    assert_eq!(controller.thumbnails().len(), 1);

    let _job = controller.select_file(png_source(30, 30));
    assert!(controller.detections().is_empty());
    assert!(controller.thumbnails().is_empty());
    assert!(controller.overlay().is_none());
    assert!(controller.take_pending_crop().is_none());
}

#[test]
fn resize_remaps_boxes_without_new_detections() {
    let mut controller = controller_with_width(100);
    load(&mut controller, png_source(200, 100));
    controller.set_detections(vec![face(10.0, 10.0, 20.0, 20.0)]);
    assert_eq!(controller.display_size(), Some(ImageDimensions::new(100, 50)));
    assert_eq!(
        controller.display_rects(),
        vec![DisplayRect { x: 5.0, y: 5.0, width: 10.0, height: 10.0 }]
    );

    controller.on_resize(ViewportLayout::new(200, None));
    assert_eq!(controller.display_size(), Some(ImageDimensions::new(200, 100)));
    assert_eq!(
        controller.display_rects(),
        vec![DisplayRect { x: 10.0, y: 10.0, width: 20.0, height: 20.0 }]
    );
    assert_eq!(controller.overlay().expect("overlay").dimensions(), (200, 100));
}

#[test]
fn empty_detections_show_placeholder_legend() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(16, 16));
    controller.set_detections(Vec::new());

    let legend = controller.legend();
    assert!(legend.is_placeholder());
    let labels: Vec<_> = legend.entries().iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, ["Happy", "Neutral", "Sad"]);
    assert!(legend.entries().iter().all(|e| e.value == "--"));
}

#[test]
fn undecodable_file_stays_loading() {
    let mut controller = controller_with_width(400);
    let job = controller.select_file(ImageSource::new(b"garbage".to_vec(), "image/png"));
    assert!(!controller.handle_message(job.run()));
    assert!(matches!(controller.image_state(), ImageState::Loading { .. }));

    controller.set_detections(vec![face(0.0, 0.0, 4.0, 4.0)]);
    assert!(controller.overlay().is_none());
    assert!(controller.take_pending_crop().is_none());
    assert!(controller.thumbnails().is_empty());
}

#[test]
fn teardown_releases_source_once() {
    let mut controller = controller_with_width(400);
    load(&mut controller, png_source(8, 8));
    let _ = controller.select_file(png_source(8, 8));
    assert_eq!(controller.registry().released_count(), 1);

    controller.teardown();
    controller.teardown();
    assert_eq!(controller.registry().live_count(), 0);
    assert_eq!(controller.registry().released_count(), 2);
    assert_eq!(controller.image_state(), ImageState::NoImage);
}

#[test]
fn extreme_boxes_degrade_softly_and_controller_recovers() {
    let mut controller = controller_with_width(40);
    load(&mut controller, png_source(40, 40));
    let mut cropper = ThumbnailCropper::default();

    controller.set_detections(vec![
        face(2.0, 2.0, 8.0, 8.0),
        face(-3e9, 4.0, 6e9, 8.0),
        face(0.0, 0.0, 1e10, 1e10),
    ]);
    let overlay = controller.overlay().expect("overlay");
    assert_eq!(overlay.dimensions(), (40, 40));
    assert!(overlay.pixels().any(|p| p[3] != 0));
    assert_eq!(controller.mood_summary()["unknown"].count, 3);

    let request = controller.take_pending_crop().expect("crop request");
    assert!(controller.handle_message(request.run(&mut cropper)));
    assert!(controller.thumbnails().is_empty());

    controller.set_detections(vec![face(2.0, 2.0, 8.0, 8.0)]);
    let request = controller.take_pending_crop().expect("crop request");
    assert!(controller.handle_message(request.run(&mut cropper)));
    assert_eq!(controller.thumbnails().len(), 1);
    assert_eq!(
        controller.thumbnails().get(0).expect("thumbnail").dimensions,
        ImageDimensions::new(8, 8)
    );
    assert_eq!(cropper.pool().allocations(), 1);
}
