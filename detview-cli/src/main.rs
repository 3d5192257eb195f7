mod args;
mod config;
mod report;

use std::{fs, fs::File, path::Path};

use anyhow::{Context, Result};
use clap::Parser;
use detview_core::{
    ImageSource, ThumbnailCropper, ViewController, composite, parse_detections_json,
};
use detview_utils::{
    configure_telemetry, init_logging, normalize_path, save_rgba_png, validate_upload,
    write_encoded,
};
use log::{info, warn};

use crate::{
    args::ViewArgs,
    config::{apply_cli_overrides, load_settings},
    report::{ThumbnailReport, WrittenOutputs, build_report},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = ViewArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let image_path = normalize_path(&args.image)?;
    let detections_path = normalize_path(&args.detections)?;

    let source = ImageSource::from_path(&image_path)?;
    validate_upload(source.media_type(), source.byte_len())
        .with_context(|| format!("cannot visualize {}", image_path.display()))?;

    let payload = fs::read_to_string(&detections_path)
        .with_context(|| format!("failed to read {}", detections_path.display()))?;
    let parsed = parse_detections_json(&payload)
        .with_context(|| format!("failed to parse {}", detections_path.display()))?;
    if !parsed.skipped.is_empty() {
        warn!(
            "Skipped {} malformed detection record(s) in {}",
            parsed.skipped.len(),
            detections_path.display()
        );
    }

    let mut view = ViewController::new(&settings)?;
    let decode = view.select_file(source);
    if !view.handle_message(decode.run()) {
        anyhow::bail!("failed to decode {}", image_path.display());
    }
    view.set_detections(parsed.records);

    let mut cropper = ThumbnailCropper::new(settings.thumbnails);
    if let Some(request) = view.take_pending_crop() {
        view.handle_message(request.run(&mut cropper));
    }

    let output_dir = &args.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
    let output_dir = normalize_path(output_dir)?;

    let overlay_path = output_dir.join("overlay.png");
    let annotated_path = output_dir.join("annotated.png");
    let (overlay, image) = match (view.overlay(), view.image()) {
        (Some(overlay), Some(image)) => (overlay, image),
        _ => anyhow::bail!("{} has no drawable display size", image_path.display()),
    };
    save_rgba_png(overlay, &overlay_path)?;
    save_rgba_png(&composite(image, overlay), &annotated_path)?;
    info!("Overlay written to {}", overlay_path.display());

    let thumbnails = write_thumbnails(&view, &output_dir.join("thumbnails"))?;
    info!(
        "{} for {}; {} thumbnail(s) written",
        view.count_label(),
        image_path.display(),
        thumbnails.len()
    );

    let report = build_report(
        &image_path,
        &view,
        parsed.skipped.len(),
        WrittenOutputs {
            overlay: &overlay_path,
            annotated: &annotated_path,
            thumbnails,
        },
    );

    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &report)
            .with_context(|| format!("failed to write report JSON to {}", json_path.display()))?;
        info!("Wrote report to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{json}");
    }

    Ok(())
}

fn write_thumbnails(view: &ViewController, dir: &Path) -> Result<Vec<ThumbnailReport>> {
    let mut written = Vec::with_capacity(view.thumbnails().len());
    for thumbnail in view.thumbnails().iter() {
        let path = dir.join(format!(
            "detection_{:03}.{}",
            thumbnail.index,
            thumbnail.format.extension()
        ));
        write_encoded(&path, &thumbnail.bytes)?;
        written.push(ThumbnailReport {
            index: thumbnail.index,
            path: path.display().to_string(),
            width: thumbnail.dimensions.width,
            height: thumbnail.dimensions.height,
            media_type: thumbnail.media_type(),
        });
    }
    Ok(written)
}
