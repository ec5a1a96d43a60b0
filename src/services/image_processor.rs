// src/services/image_processor.rs
use std::io::Cursor;

use image::{
    DynamicImage, GenericImageView, ImageFormat as ImgFormat, Rgba, RgbaImage,
    codecs::jpeg::JpegEncoder, imageops,
};

use crate::errors::KisskinError;
use crate::models::GridLayout;

const MAX_SOURCE_DIMENSION: u32 = 4096;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), KisskinError> {
        let img = image::load_from_memory(data)
            .map_err(|e| KisskinError::ImageProcessing(format!("Invalid image format: {e}")))?;

        let (width, height) = img.dimensions();
        if width > MAX_SOURCE_DIMENSION || height > MAX_SOURCE_DIMENSION {
            return Err(KisskinError::ImageProcessing(format!(
                "Image dimensions exceed {MAX_SOURCE_DIMENSION}x{MAX_SOURCE_DIMENSION}"
            )));
        }
        Ok((width, height))
    }

    /// Request shaping for the upload: bound the longest side and recompress
    /// as JPEG so the payload stays small enough for inline data URLs.
    pub fn prepare_upload(
        &self,
        data: &[u8],
        max_dimension: u32,
        jpeg_quality: u8,
    ) -> Result<Vec<u8>, KisskinError> {
        self.validate_image(data)?;
        let img = image::load_from_memory(data)
            .map_err(|e| KisskinError::ImageProcessing(format!("Failed to load image: {e}")))?;

        let (width, height) = img.dimensions();
        let resized = if width > max_dimension || height > max_dimension {
            let ratio = max_dimension as f32 / width.max(height) as f32;
            let new_width = ((width as f32 * ratio) as u32).max(1);
            let new_height = ((height as f32 * ratio) as u32).max(1);
            img.resize(new_width, new_height, imageops::FilterType::Lanczos3)
        } else {
            img
        };

        let mut output = Vec::new();
        let mut binding = Cursor::new(&mut output);
        let mut encoder = JpegEncoder::new_with_quality(&mut binding, jpeg_quality);
        encoder.encode_image(&resized.to_rgb8()).map_err(|e| {
            KisskinError::ImageProcessing(format!("Failed to encode resized image: {e}"))
        })?;
        Ok(output)
    }

    /// Square-crops the selfie and replicates it into a rows x cols sheet.
    /// Feeding the provider an already-tiled sheet biases it toward keeping
    /// the same face in every output cell.
    pub fn tile_square(
        &self,
        data: &[u8],
        layout: GridLayout,
        cell_px: u32,
    ) -> Result<Vec<u8>, KisskinError> {
        let img = image::load_from_memory(data)
            .map_err(|e| KisskinError::ImageProcessing(format!("Failed to load image: {e}")))?;

        let (width, height) = img.dimensions();
        let side = width.min(height);
        let square = img.crop_imm((width - side) / 2, (height - side) / 2, side, side);
        let cell = square
            .resize_exact(cell_px, cell_px, imageops::FilterType::Lanczos3)
            .to_rgba8();

        let mut canvas = RgbaImage::new(layout.cols * cell_px, layout.rows * cell_px);
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                imageops::overlay(
                    &mut canvas,
                    &cell,
                    (col * cell_px) as i64,
                    (row * cell_px) as i64,
                );
            }
        }
        encode_png(&DynamicImage::ImageRgba8(canvas))
    }

    /// Cuts a composite grid into rows x cols cells, row-major. Cell edges sit
    /// on `i * extent / n` boundaries so the cells tile the source exactly.
    pub fn slice_grid(
        &self,
        data: &[u8],
        layout: GridLayout,
    ) -> Result<Vec<Vec<u8>>, KisskinError> {
        let img = image::load_from_memory(data)
            .map_err(|e| KisskinError::ImageProcessing(format!("Failed to load image: {e}")))?;

        grid_cells(&img, layout)?
            .iter()
            .map(encode_png)
            .collect()
    }

    /// Download/export rendition: cells re-laid-out with padding on a white
    /// sheet, corners rounded. Persona labels travel with the HTML gallery and
    /// per-cell file names rather than being rasterized here.
    pub fn compose_export(
        &self,
        data: &[u8],
        layout: GridLayout,
        padding: u32,
        corner_radius: u32,
    ) -> Result<Vec<u8>, KisskinError> {
        let img = image::load_from_memory(data)
            .map_err(|e| KisskinError::ImageProcessing(format!("Failed to load image: {e}")))?;

        let (width, height) = img.dimensions();
        let cell_w = width / layout.cols;
        let cell_h = height / layout.rows;
        if cell_w == 0 || cell_h == 0 {
            return Err(KisskinError::ImageProcessing(format!(
                "Composite {width}x{height} is too small for a {layout} grid"
            )));
        }

        let out_w = layout.cols * cell_w + (layout.cols + 1) * padding;
        let out_h = layout.rows * cell_h + (layout.rows + 1) * padding;
        let mut canvas = RgbaImage::from_pixel(out_w, out_h, Rgba([255, 255, 255, 255]));

        for (index, cell) in grid_cells(&img, layout)?.into_iter().enumerate() {
            let mut cell = cell
                .resize_exact(cell_w, cell_h, imageops::FilterType::Lanczos3)
                .to_rgba8();
            round_corners(&mut cell, corner_radius);

            let row = index as u32 / layout.cols;
            let col = index as u32 % layout.cols;
            let x = padding + col * (cell_w + padding);
            let y = padding + row * (cell_h + padding);
            imageops::overlay(&mut canvas, &cell, x as i64, y as i64);
        }
        encode_png(&DynamicImage::ImageRgba8(canvas))
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn grid_cells(
    img: &DynamicImage,
    layout: GridLayout,
) -> Result<Vec<DynamicImage>, KisskinError> {
    let (width, height) = img.dimensions();
    if width < layout.cols || height < layout.rows {
        return Err(KisskinError::ImageProcessing(format!(
            "Composite {width}x{height} is too small for a {layout} grid"
        )));
    }

    let mut cells = Vec::with_capacity(layout.arity() as usize);
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let x0 = col * width / layout.cols;
            let x1 = (col + 1) * width / layout.cols;
            let y0 = row * height / layout.rows;
            let y1 = (row + 1) * height / layout.rows;
            cells.push(img.crop_imm(x0, y0, x1 - x0, y1 - y0));
        }
    }
    Ok(cells)
}

fn round_corners(cell: &mut RgbaImage, radius: u32) {
    let (width, height) = cell.dimensions();
    let radius = radius.min(width / 2).min(height / 2);
    if radius == 0 {
        return;
    }
    let r = radius as f32;
    for y in 0..height {
        let Some(dy) = corner_offset(y, height, radius) else {
            continue;
        };
        for x in 0..width {
            let Some(dx) = corner_offset(x, width, radius) else {
                continue;
            };
            if dx * dx + dy * dy > r * r {
                cell.get_pixel_mut(x, y).0[3] = 0;
            }
        }
    }
}

// Distance from the pixel center to the corner arc's center along one axis,
// or None when the pixel is outside the corner band.
fn corner_offset(i: u32, len: u32, radius: u32) -> Option<f32> {
    if i < radius {
        Some(radius as f32 - i as f32 - 0.5)
    } else if i >= len - radius {
        Some(i as f32 - (len - radius) as f32 + 0.5)
    } else {
        None
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, KisskinError> {
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImgFormat::Png)
        .map_err(|e| KisskinError::ImageProcessing(format!("Failed to encode image: {e}")))?;
    Ok(output)
}
