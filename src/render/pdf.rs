//! PDF assembly with `printpdf`.
//!
//! Pages are drawn strictly in order onto fresh A4 pages of one document.
//! The buyer's signature is converted once and the same pixels are placed in
//! every signature slot.

use std::io::BufWriter;

use ::image::{Rgba, RgbImage, RgbaImage};
use printpdf::*;
use tracing::debug;

use super::layout::{Op, Page as LayoutPage, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use super::metrics::Font;
use crate::error::{AppError, Result};
use crate::signature::Signature;

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// 1-based pages that received the signature raster
    pub signed_pages: Vec<usize>,
}

/// Raster prepared for embedding, composited against white.
struct PreparedRaster {
    width_px: u32,
    height_px: u32,
    rgb: Vec<u8>,
}

fn prepare_signature(image: &RgbaImage) -> PreparedRaster {
    let (width_px, height_px) = image.dimensions();

    let mut rgb_image = RgbImage::new(width_px, height_px);
    for (x, y, pixel) in image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)) as u8;
        rgb_image.put_pixel(x, y, ::image::Rgb([out_r, out_g, out_b]));
    }

    PreparedRaster {
        width_px,
        height_px,
        rgb: rgb_image.into_raw(),
    }
}

pub fn render_pdf(
    title: &str,
    pages: &[LayoutPage],
    signature: Option<&Signature>,
) -> Result<RenderedPdf> {
    if pages.is_empty() {
        return Err(AppError::Render("document has no pages".to_string()));
    }

    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let font_regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| AppError::Render(e.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| AppError::Render(e.to_string()))?;

    let raster = signature.map(|s| prepare_signature(s.image()));
    let mut signed_pages = Vec::new();

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_index).get_layer(layer_index)
        };

        let mut embedded = false;
        for op in &page.ops {
            match op {
                Op::Text {
                    x,
                    y,
                    size,
                    font,
                    text,
                } => {
                    let font_ref = match font {
                        Font::Regular => &font_regular,
                        Font::Bold => &font_bold,
                    };
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(PAGE_HEIGHT_MM - y), font_ref);
                }
                Op::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    thickness,
                    gray,
                } => {
                    layer.set_outline_color(Color::Rgb(Rgb::new(*gray, *gray, *gray, None)));
                    layer.set_outline_thickness(*thickness);
                    draw_line(
                        &layer,
                        *x1,
                        PAGE_HEIGHT_MM - y1,
                        *x2,
                        PAGE_HEIGHT_MM - y2,
                    );
                }
                Op::SignatureSlot {
                    x,
                    y_top,
                    width,
                    height,
                } => {
                    if let Some(raster) = &raster {
                        embed_signature(&layer, raster, *x, PAGE_HEIGHT_MM - y_top, *width, *height);
                        embedded = true;
                    }
                }
            }
        }
        if embedded {
            signed_pages.push(page.number);
        }
        debug!(page = page.number, section = page.section, ops = page.ops.len(), "Page drawn");
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|e| AppError::Render(e.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Render(e.to_string()))?;

    Ok(RenderedPdf {
        bytes,
        page_count: pages.len(),
        signed_pages,
    })
}

/// Places the raster inside the slot, preserving aspect ratio, anchored to
/// the slot's top-left corner. `top_y` is in PDF coordinates.
fn embed_signature(
    layer: &PdfLayerReference,
    raster: &PreparedRaster,
    x: f32,
    top_y: f32,
    max_width_mm: f32,
    max_height_mm: f32,
) {
    let aspect_ratio = raster.width_px as f32 / raster.height_px as f32;
    let (final_width_mm, final_height_mm) = if max_width_mm / max_height_mm > aspect_ratio {
        // Height-constrained
        (max_height_mm * aspect_ratio, max_height_mm)
    } else {
        // Width-constrained
        (max_width_mm, max_width_mm / aspect_ratio)
    };

    let image = Image::from(ImageXObject {
        width: Px(raster.width_px as usize),
        height: Px(raster.height_px as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: raster.rgb.clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    // DPI = pixels / (mm / 25.4)
    let dpi = (raster.width_px as f32) / (final_width_mm / 25.4);

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(top_y - final_height_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

fn draw_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    let points = vec![
        (Point::new(Mm(x1), Mm(y1)), false),
        (Point::new(Mm(x2), Mm(y2)), false),
    ];
    let line = Line {
        points,
        is_closed: false,
    };
    layer.add_line(line);
}
