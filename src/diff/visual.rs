use crate::error::VisualDiffError;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};

const DIFF_THRESHOLD: u8 = 30;
const MIN_COMPONENT_AREA: usize = 100;
const DILATION_ITERATIONS: usize = 2;
const DILATION_KERNEL: i32 = 2; // 5x5 kernel, i.e. +/-2 around each pixel
const OVERLAY_ALPHA: f32 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct BoundingRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Produces an annotated PNG highlighting the regions that changed between two screenshots.
/// Failures here are always non-fatal to the enclosing Diff; callers log and continue without a
/// visual path.
pub fn generate(old_png: &[u8], new_png: &[u8]) -> Result<Vec<u8>, VisualDiffError> {
    let old_image = image::load_from_memory(old_png)?;
    let new_image = image::load_from_memory(new_png)?;

    let (width, height) = new_image.dimensions();
    let old_image = if old_image.dimensions() != (width, height) {
        old_image.resize_exact(width, height, image::imageops::FilterType::Triangle)
    } else {
        old_image
    };

    let mask = diff_mask(&old_image, &new_image);
    let components = connected_components(&mask, width, height);
    let surviving: Vec<_> = components.into_iter().filter(|c| c.len() > MIN_COMPONENT_AREA).collect();

    let mut dilated = vec![false; (width * height) as usize];
    for component in &surviving {
        for &idx in component {
            dilated[idx] = true;
        }
    }
    for _ in 0..DILATION_ITERATIONS {
        dilated = dilate(&dilated, width, height);
    }

    let bounding_rects: Vec<BoundingRect> = surviving.iter().map(|c| bounding_rect(c, width)).collect();
    let overlay = render_overlay(&new_image, &dilated, width, height, &bounding_rects);

    let mut bytes = Vec::new();
    overlay.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

fn diff_mask(old_image: &DynamicImage, new_image: &DynamicImage) -> Vec<bool> {
    let old_gray = old_image.to_luma8();
    let new_gray = new_image.to_luma8();

    old_gray
        .pixels()
        .zip(new_gray.pixels())
        .map(|(a, b)| a[0].abs_diff(b[0]) > DIFF_THRESHOLD)
        .collect()
}

/// 4-connected flood fill over the binary mask, standing in for external-contour extraction.
fn connected_components(mask: &[bool], width: u32, height: u32) -> Vec<Vec<usize>> {
    let (width, height) = (width as usize, height as usize);
    let mut visited = vec![false; mask.len()];
    let mut components = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        visited[start] = true;

        while let Some(idx) = stack.pop() {
            component.push(idx);
            let (x, y) = (idx % width, idx / width);
            let neighbors = [
                (x.checked_sub(1), Some(y)),
                (Some(x + 1).filter(|&v| v < width), Some(y)),
                (Some(x), y.checked_sub(1)),
                (Some(x), Some(y + 1).filter(|&v| v < height)),
            ];
            for (nx, ny) in neighbors {
                if let (Some(nx), Some(ny)) = (nx, ny) {
                    let nidx = ny * width + nx;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push(nidx);
                    }
                }
            }
        }
        components.push(component);
    }
    components
}

fn dilate(mask: &[bool], width: u32, height: u32) -> Vec<bool> {
    let (width, height) = (width as i64, height as i64);
    let mut out = vec![false; mask.len()];

    for y in 0..height {
        for x in 0..width {
            let mut set = false;
            'kernel: for dy in -DILATION_KERNEL as i64..=DILATION_KERNEL as i64 {
                for dx in -DILATION_KERNEL as i64..=DILATION_KERNEL as i64 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx >= 0 && nx < width && ny >= 0 && ny < height {
                        if mask[(ny * width + nx) as usize] {
                            set = true;
                            break 'kernel;
                        }
                    }
                }
            }
            out[(y * width + x) as usize] = set;
        }
    }
    out
}

fn bounding_rect(component: &[usize], width: u32) -> BoundingRect {
    let width = width as usize;
    let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
    let (mut max_x, mut max_y) = (0, 0);
    for &idx in component {
        let (x, y) = (idx % width, idx / width);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    BoundingRect {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    }
}

fn render_overlay(
    base: &DynamicImage,
    mask: &[bool],
    width: u32,
    height: u32,
    rects: &[BoundingRect],
) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
    let mut canvas = base.to_rgba8();

    for (idx, pixel) in canvas.pixels_mut().enumerate() {
        if mask[idx] {
            let [r, g, b, a] = pixel.0;
            pixel.0 = [
                blend(r, 255, OVERLAY_ALPHA),
                blend(g, 0, OVERLAY_ALPHA),
                blend(b, 0, OVERLAY_ALPHA),
                a,
            ];
        }
    }

    for rect in rects {
        draw_rect_outline(&mut canvas, *rect, width, height, Rgba([255, 0, 0, 255]));
    }
    canvas
}

fn blend(base: u8, overlay: u8, alpha: f32) -> u8 {
    (base as f32 * (1.0 - alpha) + overlay as f32 * alpha).round() as u8
}

fn draw_rect_outline(canvas: &mut ImageBuffer<Rgba<u8>, Vec<u8>>, rect: BoundingRect, width: u32, height: u32, color: Rgba<u8>) {
    let x_end = (rect.x + rect.width).min(width.saturating_sub(1));
    let y_end = (rect.y + rect.height).min(height.saturating_sub(1));

    for x in rect.x..=x_end {
        canvas.put_pixel(x, rect.y, color);
        canvas.put_pixel(x, y_end, color);
    }
    for y in rect.y..=y_end {
        canvas.put_pixel(rect.x, y, color);
        canvas.put_pixel(x_end, y, color);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn encode(width: u32, height: u32, fill: [u8; 4]) -> Vec<u8> {
        let buf: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |_, _| Rgba(fill));
        let mut bytes = Vec::new();
        buf.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn identical_images_have_no_flagged_components() {
        let image_bytes = encode(20, 20, [10, 10, 10, 255]);
        let mask = diff_mask(
            &image::load_from_memory(&image_bytes).unwrap(),
            &image::load_from_memory(&image_bytes).unwrap(),
        );
        assert!(mask.iter().all(|&changed| !changed));
    }

    #[test]
    fn generate_produces_decodable_png() {
        let old_bytes = encode(32, 32, [0, 0, 0, 255]);
        let new_bytes = encode(32, 32, [255, 255, 255, 255]);
        let result = generate(&old_bytes, &new_bytes).unwrap();
        assert!(image::load_from_memory(&result).is_ok());
    }
}
