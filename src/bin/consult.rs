// src/bin/consult.rs
//
// Headless consultation client: reads a selfie, shapes it for upload, submits
// the analysis to a running gateway, and writes the grid, per-persona cells,
// export image, and rendered report to disk.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use serde::Deserialize;
use serde_json::json;

use kisskin::client::flow::{AnalysisOutcome, Event, PreparedPhoto, Stage};
use kisskin::client::render::{self, ResultPage};
use kisskin::models::{DataUrl, Gender, GridLayout, SkinType};
use kisskin::report;
use kisskin::services::ImageProcessor;

const UPLOAD_MAX_DIMENSION: u32 = 1024;
const UPLOAD_JPEG_QUALITY: u8 = 85;
const TILE_CELL_PX: u32 = 320;
const EXPORT_PADDING: u32 = 24;
const EXPORT_CORNER_RADIUS: u32 = 28;

#[derive(Parser, Debug)]
#[command(name = "consult")]
#[command(about = "Run a KisSkin makeup analysis against a running gateway")]
struct Args {
    /// Selfie to analyze
    photo: PathBuf,

    /// 성별: 여성/남성 (or female/male)
    #[arg(long)]
    gender: String,

    /// 피부 타입: 건성/지성/중성/복합성
    #[arg(long)]
    skin_type: String,

    /// Preferred makeup direction, free text
    #[arg(long)]
    style: Option<String>,

    /// Gateway base URL
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "KISSKIN_GATEWAY_URL")]
    gateway: String,

    /// Grid arrangement requested from the provider
    #[arg(long, default_value = "3x3")]
    grid_size: String,

    /// Also send a pre-tiled sheet to bias the provider toward keeping the
    /// same face in every cell
    #[arg(long)]
    tile: bool,

    /// Output directory for the grid, cells, export image, and report
    #[arg(long, default_value = "./consultation")]
    out_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    image: Option<String>,
    report: Option<String>,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let gender: Gender = args.gender.parse()?;
    let skin_type: SkinType = args.skin_type.parse()?;
    let layout: GridLayout = args.grid_size.parse()?;

    let mut stage = Stage::Home.advance(Event::Start);

    let raw = fs::read(&args.photo)
        .with_context(|| format!("failed to read {}", args.photo.display()))?;
    let kind = infer::get(&raw).context("could not determine the photo's file type")?;
    if !kind.mime_type().starts_with("image/") {
        bail!(
            "{} is not an image file ({})",
            args.photo.display(),
            kind.mime_type()
        );
    }

    let processor = ImageProcessor::new();
    let prepared = processor.prepare_upload(&raw, UPLOAD_MAX_DIMENSION, UPLOAD_JPEG_QUALITY)?;
    let (width, height) = processor.validate_image(&prepared)?;
    let ratio = width as f32 / height as f32;
    let data_url = DataUrl::encode("image/jpeg", &prepared);
    let grid_data_url = if args.tile {
        let sheet = processor.tile_square(&prepared, layout, TILE_CELL_PX)?;
        Some(DataUrl::encode("image/png", &sheet))
    } else {
        None
    };
    info!(
        "photo prepared: {width}x{height}, {} KiB{}",
        prepared.len() / 1024,
        if args.tile { ", tiled sheet attached" } else { "" }
    );

    stage = stage.advance(Event::PhotoSelected(PreparedPhoto {
        data_url: data_url.clone(),
        grid_data_url: grid_data_url.clone(),
        ratio,
    }));
    stage = stage.advance(Event::GenderSelected(gender));
    stage = stage.advance(Event::SkinTypeSelected(skin_type));
    if !stage.can_submit() {
        bail!("photo, gender, and skin type are all required");
    }
    stage = stage.advance(Event::Submitted);
    info!("AI가 맞춤 메이크업을 분석하고 있어요... (약 30~60초 소요)");

    stage = match submit(&args, &data_url, grid_data_url.as_deref(), ratio).await {
        Ok(outcome) => stage.advance(Event::Succeeded(outcome)),
        Err(message) => stage.advance(Event::Failed(message)),
    };

    match stage {
        Stage::Result { outcome, .. } => {
            write_outputs(&args, gender, skin_type, layout, &outcome)
        }
        Stage::Form(form) => bail!(
            "분석 중 오류가 발생했습니다: {}",
            form.error.unwrap_or_default()
        ),
        other => bail!("unexpected flow stage: {other:?}"),
    }
}

async fn submit(
    args: &Args,
    photo: &str,
    grid_photo: Option<&str>,
    ratio: f32,
) -> std::result::Result<AnalysisOutcome, String> {
    let mut body = json!({
        "photo": photo,
        "gender": args.gender,
        "skinType": args.skin_type,
        "photoRatio": ratio,
        "gridSize": args.grid_size,
    });
    if let Some(style) = &args.style {
        body["makeupStyle"] = json!(style);
    }
    if let Some(grid) = grid_photo {
        body["gridPhoto"] = json!(grid);
    }

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/analyze", args.gateway.trim_end_matches('/')))
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    let payload: GatewayResponse = response
        .json()
        .await
        .map_err(|e| format!("invalid gateway response: {e}"))?;

    if !status.is_success() {
        return Err(payload
            .error
            .unwrap_or_else(|| format!("gateway returned {status}")));
    }
    Ok(AnalysisOutcome {
        image: payload.image,
        report: payload.report,
    })
}

fn write_outputs(
    args: &Args,
    gender: Gender,
    skin_type: SkinType,
    layout: GridLayout,
    outcome: &AnalysisOutcome,
) -> Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let processor = ImageProcessor::new();

    let mut cells = Vec::new();
    let mut export_file = None;
    if let Some(image) = &outcome.image {
        let grid = DataUrl::parse(image)?;
        let grid_path = args.out_dir.join("makeup-grid.png");
        fs::write(&grid_path, &grid.bytes)?;
        info!("composite grid -> {}", grid_path.display());

        for (label, cell) in layout
            .personas()
            .iter()
            .zip(processor.slice_grid(&grid.bytes, layout)?)
        {
            let file = format!("cell-{}.png", slugify(label));
            fs::write(args.out_dir.join(&file), &cell)?;
            cells.push((label.to_string(), file));
        }

        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let export_name = format!("kisskin-makeup-{stamp}.png");
        let export =
            processor.compose_export(&grid.bytes, layout, EXPORT_PADDING, EXPORT_CORNER_RADIUS)?;
        fs::write(args.out_dir.join(&export_name), &export)?;
        info!("export image -> {}", args.out_dir.join(&export_name).display());
        export_file = Some(export_name);
    }

    let report = outcome.report.as_deref().map(report::parse);
    let page = ResultPage {
        gender_label: gender.label_ko(),
        skin_label: skin_type.label_ko(),
        image_data_url: outcome.image.as_deref(),
        cells,
        export_file: export_file.as_deref(),
        report: report.as_ref(),
    };
    let report_path = args.out_dir.join("report.html");
    fs::write(&report_path, render::render_result_page(&page))?;
    info!("report -> {}", report_path.display());
    Ok(())
}

fn slugify(label: &str) -> String {
    label.to_lowercase().replace(' ', "-")
}
