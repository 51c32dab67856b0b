//! Picture outputs: the overlay of the indexed grid on the slide and the
//! de-arrayed virtual grid.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;
use plotters::prelude::*;

use crate::cores::Core;
use crate::params::VirtualGridLayout;

const ROW_LINK: RGBColor = RGBColor(70, 130, 200);
const REAL_CORE: RGBColor = RGBColor(40, 170, 80);
const IMAGINARY_CORE: RGBColor = RGBColor(230, 130, 30);
const UNINDEXED_CORE: RGBColor = RGBColor(200, 40, 40);
const MIN_MARKER_RADIUS: i32 = 3;

const CELL_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const CELL_REAL: Rgb<u8> = Rgb([0, 160, 0]);
const CELL_IMAGINARY: Rgb<u8> = Rgb([220, 0, 0]);
const LABEL: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_SCALE: u32 = 2;

/// Character map of the indexed grid: `o` for a real core, `+` for an imaginary
/// one, space where nothing was assigned. Rows and columns follow the core
/// indices.
pub fn build_index_grid(cores: &[Core]) -> Vec<Vec<char>> {
    let rows = cores.iter().filter_map(|c| c.row).max().map_or(0, |r| r + 1);
    let cols = cores.iter().filter_map(|c| c.col).max().map_or(0, |c| c + 1);
    let mut grid = vec![vec![' '; cols]; rows];

    for core in cores {
        let (Some(r), Some(c)) = (core.row, core.col) else {
            continue;
        };
        // first writer wins on collisions
        if grid[r][c] == ' ' {
            grid[r][c] = if core.is_imaginary { '+' } else { 'o' };
        }
    }
    grid
}

fn to_pixel(v: f64, limit: u32) -> i32 {
    (v.round() as i32).clamp(0, limit.saturating_sub(1) as i32)
}

/// Renders indexed cores over `background` (or white when `None`).
///
/// Cores in the same row are linked in column order; real cores are drawn as
/// rings of their radius, imaginary ones as filled markers.
pub fn render_overlay(
    width: u32,
    height: u32,
    background: Option<&RgbImage>,
    cores: &[Core],
) -> Result<RgbImage, String> {
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| "width*height overflow".to_string())?;
    if pixel_count == 0 {
        return Ok(RgbImage::new(width, height));
    }

    let mut rgb = match background {
        Some(bg) if bg.dimensions() == (width, height) => bg.as_raw().clone(),
        Some(bg) => {
            return Err(format!(
                "background is {}x{}, overlay is {width}x{height}",
                bg.width(),
                bg.height()
            ));
        }
        None => vec![255u8; pixel_count * 3],
    };

    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();

        let mut by_row: Vec<Vec<&Core>> = Vec::new();
        for core in cores {
            if let (Some(r), Some(_)) = (core.row, core.col) {
                if by_row.len() <= r {
                    by_row.resize_with(r + 1, Vec::new);
                }
                by_row[r].push(core);
            }
        }
        for row in &mut by_row {
            row.sort_by_key(|c| c.col);
            let path: Vec<(i32, i32)> = row
                .iter()
                .map(|c| (to_pixel(c.x, width), to_pixel(c.y, height)))
                .collect();
            if path.len() > 1 {
                root.draw(&PathElement::new(path, ROW_LINK.stroke_width(2)))
                    .map_err(|e| e.to_string())?;
            }
        }

        for core in cores {
            let center = (to_pixel(core.x, width), to_pixel(core.y, height));
            let radius = (core.radius.round() as i32).max(MIN_MARKER_RADIUS);
            if core.is_imaginary {
                root.draw(&Circle::new(center, MIN_MARKER_RADIUS + 1, IMAGINARY_CORE.filled()))
                    .map_err(|e| e.to_string())?;
            } else {
                let color = if core.row.is_some() { REAL_CORE } else { UNINDEXED_CORE };
                root.draw(&Circle::new(center, radius, color.stroke_width(2)))
                    .map_err(|e| e.to_string())?;
            }
        }

        root.present().map_err(|e| e.to_string())?;
    }

    RgbImage::from_raw(width, height, rgb).ok_or_else(|| "overlay buffer size mismatch".to_string())
}

/// 3x5 glyphs for cell labels, one row per byte, high bit on the left.
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        _ => return None,
    })
}

fn draw_label(canvas: &mut RgbImage, text: &str, left: i32, top: i32) {
    let cell = LABEL_SCALE as i32;
    let mut x = left;
    for c in text.chars() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        for (gy, bits) in rows.iter().enumerate() {
            for gx in 0..3 {
                if bits & (0b100 >> gx) != 0 {
                    let rect = Rect::at(x + gx * cell, top + gy as i32 * cell).of_size(LABEL_SCALE, LABEL_SCALE);
                    draw_filled_rect_mut(canvas, rect, LABEL);
                }
            }
        }
        x += 4 * cell;
    }
}

/// Copies the disc of `radius` around `from` in `source` to the disc around `to`.
fn copy_disc(canvas: &mut RgbImage, source: &RgbImage, from: (i64, i64), to: (i64, i64), radius: i64) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (sx, sy) = (from.0 + dx, from.1 + dy);
            let (tx, ty) = (to.0 + dx, to.1 + dy);
            let inside = |x: i64, y: i64, img: &RgbImage| {
                x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height())
            };
            if inside(sx, sy, source) && inside(tx, ty, canvas) {
                let pixel = *source.get_pixel(sx as u32, sy as u32);
                canvas.put_pixel(tx as u32, ty as u32, pixel);
            }
        }
    }
}

/// Lays the indexed cores out as a regular grid, each cell showing the disc of
/// `source` around its core.
///
/// Cell `(row, col)` is centred at `start + (col, row) * spacing`. Real cores
/// get a green ring and imaginary ones a red ring; every cell is labelled
/// `(row,col)`. Cores without an index are left out.
pub fn render_virtual_grid(source: &RgbImage, cores: &[Core], layout: &VirtualGridLayout) -> RgbImage {
    let rows = cores.iter().filter_map(|c| c.row).max().map_or(0, |r| r as u32 + 1);
    let cols = cores.iter().filter_map(|c| c.col).max().map_or(0, |c| c as u32 + 1);
    let width = cols * layout.horizontal_spacing + 2 * layout.radius + layout.start_x;
    let height = rows * layout.vertical_spacing + 2 * layout.radius + layout.start_y;
    let mut canvas = RgbImage::from_pixel(width.max(1), height.max(1), CELL_BACKGROUND);

    let radius = i64::from(layout.radius);
    for core in cores {
        let (Some(row), Some(col)) = (core.row, core.col) else {
            continue;
        };
        let center = (
            i64::from(layout.start_x) + col as i64 * i64::from(layout.horizontal_spacing),
            i64::from(layout.start_y) + row as i64 * i64::from(layout.vertical_spacing),
        );
        let from = (
            (core.x + f64::from(layout.x_offset)).round() as i64,
            (core.y + f64::from(layout.y_offset)).round() as i64,
        );
        copy_disc(&mut canvas, source, from, center, radius);

        let ring = if core.is_imaginary { CELL_IMAGINARY } else { CELL_REAL };
        let c = (center.0 as i32, center.1 as i32);
        draw_hollow_circle_mut(&mut canvas, c, radius as i32, ring);
        draw_hollow_circle_mut(&mut canvas, c, radius as i32 + 1, ring);

        let half = radius as i32 / 2;
        draw_label(&mut canvas, &format!("({row},{col})"), c.0 - half, c.1 - half);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(x: f64, y: f64, row: usize, col: usize, imaginary: bool) -> Core {
        let mut core = if imaginary {
            Core::imaginary(x, y, 5.0)
        } else {
            Core::new(x, y, 5.0)
        };
        core.row = Some(row);
        core.col = Some(col);
        core
    }

    #[test]
    fn index_grid_marks_imaginary_cells() {
        let cores = vec![
            indexed(0.0, 0.0, 0, 0, false),
            indexed(10.0, 0.0, 0, 1, true),
            indexed(0.0, 10.0, 1, 1, false),
        ];
        let grid = build_index_grid(&cores);
        assert_eq!(grid, vec![vec!['o', '+'], vec![' ', 'o']]);
    }

    #[test]
    fn overlay_draws_on_white_canvas() {
        let cores = vec![indexed(10.0, 10.0, 0, 0, false), indexed(30.0, 10.0, 0, 1, true)];
        let img = render_overlay(40, 20, None, &cores).expect("render");
        assert_eq!(img.dimensions(), (40, 20));
        assert!(img.pixels().any(|p| p.0 != [255, 255, 255]));
    }

    #[test]
    fn virtual_grid_cuts_out_each_core() {
        // red left half, blue right half
        let source = RgbImage::from_fn(200, 100, |x, _| if x < 100 { Rgb([200, 0, 0]) } else { Rgb([0, 0, 200]) });
        let mut stray = Core::new(10.0, 10.0, 5.0);
        stray.row = None;
        let cores = vec![
            indexed(50.0, 50.0, 0, 0, false),
            indexed(150.0, 50.0, 0, 1, true),
            stray,
        ];
        let layout = VirtualGridLayout::default()
            .with_spacing(40, 40)
            .with_start(25, 25)
            .with_radius(15);

        let grid = render_virtual_grid(&source, &cores, &layout);
        assert_eq!(grid.dimensions(), (2 * 40 + 30 + 25, 40 + 30 + 25));
        // below the labels, inside each disc
        assert_eq!(*grid.get_pixel(25, 33), Rgb([200, 0, 0]));
        assert_eq!(*grid.get_pixel(65, 33), Rgb([0, 0, 200]));
        // bottom of each ring
        assert_eq!(*grid.get_pixel(25, 40), CELL_REAL);
        assert_eq!(*grid.get_pixel(65, 40), CELL_IMAGINARY);
        assert_eq!(*grid.get_pixel(0, 0), CELL_BACKGROUND);
        // the label starts half a radius up and left of the centre
        assert_eq!(*grid.get_pixel(18 + 4, 18), LABEL);
    }

    #[test]
    fn mismatched_background_is_an_error() {
        let bg = RgbImage::new(5, 5);
        assert!(render_overlay(6, 5, Some(&bg), &[]).is_err());
    }
}
