use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use image::{ImageBuffer, Rgb};
use serde_json::Value;
use tempfile::tempdir;

fn write_image(path: &Path, width: u32, height: u32) -> Result<(), Box<dyn Error>> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 255) as u8, (y % 255) as u8, 200u8])
    });
    img.save(path)?;
    Ok(())
}

#[test]
fn renders_overlay_thumbnails_and_report() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("scene.png");
    write_image(&image_path, 200, 100)?;

    let detections_path = work_dir.path().join("detections.json");
    fs::write(
        &detections_path,
        r#"{"detections": [
            {"class": "happy", "confidence": 0.8, "x": 10, "y": 40, "width": 20, "height": 20,
             "mood": "happy", "moodConfidence": 0.9},
            {"class": "happy", "confidence": 0.6, "x": 60, "y": 40, "width": 30, "height": 30},
            {"class": "sad", "confidence": 1.0, "x": 190, "y": 90, "width": 20, "height": 20},
            {"class": "broken", "x": 1}
        ]}"#,
    )?;
    let output_dir = work_dir.path().join("out");
    let report_path = work_dir.path().join("report.json");

    let mut cmd = cargo_bin_cmd!("detview-cli");
    cmd.arg("--image")
        .arg(&image_path)
        .arg("--detections")
        .arg(&detections_path)
        .arg("--output-dir")
        .arg(&output_dir)
        .arg("--display-width")
        .arg("100")
        .arg("--json")
        .arg(&report_path);
    cmd.assert().success();

    let overlay = image::open(output_dir.join("overlay.png"))?;
    assert_eq!((overlay.width(), overlay.height()), (100, 50));
    let annotated = image::open(output_dir.join("annotated.png"))?;
    assert_eq!((annotated.width(), annotated.height()), (100, 50));

    let clipped = image::open(output_dir.join("thumbnails/detection_002.png"))?.to_rgba8();
    assert_eq!(clipped.dimensions(), (20, 20));
    assert_eq!(clipped.get_pixel(0, 0)[3], 255);
    assert_eq!(clipped.get_pixel(15, 15)[3], 0);

    let report: Value = serde_json::from_str(&fs::read_to_string(&report_path)?)?;
    assert_eq!(report["native"]["width"], 200);
    assert_eq!(report["display"]["height"], 50);
    assert_eq!(report["count_label"], "3 detections");
    assert_eq!(report["skipped_records"], 1);
    assert_eq!(report["categories"]["happy"]["count"], 2);
    assert_eq!(report["categories"]["happy"]["percent"], "70%");
    assert_eq!(report["moods"]["unknown"]["count"], 2);
    assert_eq!(report["moods"]["unknown"]["percent"], "80%");
    assert_eq!(report["moods"]["happy"]["percent"], "80%");
    assert_eq!(report["legend"]["kind"], "populated");
    assert_eq!(report["rows"][0]["bounds"], "Box: (10, 40) - (30, 60)");
    assert_eq!(report["thumbnails"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn empty_detections_print_placeholder_report() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("blank.png");
    write_image(&image_path, 32, 24)?;
    let detections_path = work_dir.path().join("none.json");
    fs::write(&detections_path, "[]")?;
    let output_dir = work_dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("detview-cli");
    cmd.arg("--image")
        .arg(&image_path)
        .arg("--detections")
        .arg(&detections_path)
        .arg("--output-dir")
        .arg(&output_dir);
    let output = cmd.output()?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["count_label"], "0 detections");
    assert_eq!(report["legend"]["kind"], "placeholder");
    assert_eq!(report["legend"]["entries"][0]["value"], "--");
    assert!(!output_dir.join("thumbnails").exists());

    let overlay = image::open(output_dir.join("overlay.png"))?.to_rgba8();
    assert_eq!(overlay.dimensions(), (32, 24));
    assert!(overlay.pixels().all(|p| p[3] == 0));
    Ok(())
}

#[test]
fn jpeg_thumbnails_follow_format_flag() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("scene.png");
    write_image(&image_path, 64, 64)?;
    let detections_path = work_dir.path().join("detections.json");
    fs::write(
        &detections_path,
        r#"[{"class": "neutral", "confidence": 0.5, "x": 8, "y": 8, "width": 16, "height": 12}]"#,
    )?;
    let output_dir = work_dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("detview-cli");
    cmd.arg("--image")
        .arg(&image_path)
        .arg("--detections")
        .arg(&detections_path)
        .arg("--output-dir")
        .arg(&output_dir)
        .arg("--thumbnail-format")
        .arg("jpeg")
        .arg("--jpeg-quality")
        .arg("70");
    cmd.assert().success();

    let thumbnail = image::open(output_dir.join("thumbnails/detection_000.jpg"))?;
    assert_eq!((thumbnail.width(), thumbnail.height()), (16, 12));
    Ok(())
}

#[test]
fn unsupported_file_type_is_rejected() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("scene.bmp");
    let img = ImageBuffer::from_pixel(4, 4, Rgb([1u8, 2, 3]));
    img.save_with_format(&image_path, image::ImageFormat::Png)?;
    let detections_path = work_dir.path().join("detections.json");
    fs::write(&detections_path, "[]")?;

    let mut cmd = cargo_bin_cmd!("detview-cli");
    cmd.arg("--image")
        .arg(&image_path)
        .arg("--detections")
        .arg(&detections_path)
        .arg("--output-dir")
        .arg(work_dir.path().join("out"));
    let output = cmd.output()?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid file type"), "stderr was: {stderr}");
    Ok(())
}
