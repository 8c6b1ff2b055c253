use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use mapview::{validate_asset_key, DrawPool, DrawPools, PoolKind, Primitive, Rect, Rgba, Size};
use tracing::warn;

const CLEAR_COLOR: Rgba = [12, 14, 18, 255];
const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const TEXT_SCALE: i32 = 2;
const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;

struct LoadedTexture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

/// CPU rasterizer for the view's draw pools.
///
/// The map pool is drawn into an off-screen buffer in buffer space and then
/// stretched from its source rect onto its destination rect; the remaining
/// pools already carry destination coordinates.
pub(crate) struct Rasterizer {
    asset_root: PathBuf,
    textures: HashMap<String, Option<LoadedTexture>>,
    warned_texture_keys: HashSet<String>,
    map_buffer: Vec<u8>,
    map_buffer_size: Size,
}

impl Rasterizer {
    pub(crate) fn new(asset_root: PathBuf) -> Self {
        Self {
            asset_root,
            textures: HashMap::new(),
            warned_texture_keys: HashSet::new(),
            map_buffer: Vec::new(),
            map_buffer_size: Size::default(),
        }
    }

    pub(crate) fn render(&mut self, pools: &DrawPools, frame: &mut [u8], frame_size: Size) {
        fill(frame, CLEAR_COLOR);
        for pool in pools.in_order() {
            if pool.is_empty() {
                continue;
            }
            match pool.kind() {
                PoolKind::Map => self.render_map_pool(pool, frame, frame_size),
                _ => {
                    let clip = if pool.dest().is_empty() {
                        Rect::from_point_size(Default::default(), frame_size)
                    } else {
                        pool.dest()
                    };
                    let mut target = Canvas::new(frame, frame_size, clip);
                    self.rasterize_commands(pool, &mut target);
                }
            }
        }
    }

    fn render_map_pool(&mut self, pool: &DrawPool, frame: &mut [u8], frame_size: Size) {
        let buffer_size = pool.buffer_size();
        if buffer_size.is_empty() {
            return;
        }
        if self.map_buffer_size != buffer_size {
            self.map_buffer = vec![0; byte_len(buffer_size)];
            self.map_buffer_size = buffer_size;
        }
        let mut buffer = std::mem::take(&mut self.map_buffer);
        fill(&mut buffer, [0, 0, 0, 0]);
        {
            let full = Rect::from_point_size(Default::default(), buffer_size);
            let mut canvas = Canvas::new(&mut buffer, buffer_size, full);
            self.rasterize_commands(pool, &mut canvas);
        }
        stretch_blit(
            &buffer,
            buffer_size,
            pool.src(),
            frame,
            frame_size,
            pool.dest(),
            pool.opacity(),
        );
        self.map_buffer = buffer;
    }

    fn rasterize_commands(&mut self, pool: &DrawPool, canvas: &mut Canvas<'_>) {
        let pool_opacity = if pool.kind() == PoolKind::Map {
            1.0
        } else {
            pool.opacity()
        };
        for command in pool.commands() {
            let opacity = pool_opacity * command.opacity;
            match &command.primitive {
                Primitive::FilledRect { rect, color } => canvas.fill_rect(*rect, *color, opacity),
                Primitive::TexturedRect { rect, texture } => {
                    match self.resolve_texture(&texture.0) {
                        Some(loaded) => canvas.draw_texture(*rect, loaded, opacity),
                        None => canvas.fill_rect(*rect, fallback_color(&texture.0), opacity),
                    }
                }
                Primitive::Text {
                    origin,
                    clip,
                    text,
                    color,
                } => canvas.draw_text(origin.x, origin.y, *clip, text, *color, opacity),
            }
        }
    }

    fn resolve_texture(&mut self, key: &str) -> Option<&LoadedTexture> {
        if !self.textures.contains_key(key) {
            let loaded = match texture_path(&self.asset_root, key)
                .and_then(|path| load_texture_rgba(&path).map_err(|reason| (Some(path), reason)))
            {
                Ok(texture) => Some(texture),
                Err((path, reason)) => {
                    warn_texture_load_once(&mut self.warned_texture_keys, key, path.as_deref(), &reason);
                    None
                }
            };
            self.textures.insert(key.to_string(), loaded);
        }
        self.textures.get(key).and_then(Option::as_ref)
    }
}

fn texture_path(asset_root: &Path, key: &str) -> Result<PathBuf, (Option<PathBuf>, String)> {
    validate_asset_key(key).map_err(|error| (None, format!("invalid_key:{error}")))?;
    Ok(asset_root.join(format!("{key}.png")))
}

fn load_texture_rgba(path: &Path) -> Result<LoadedTexture, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedTexture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_texture_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        texture_key = key,
        path = %path_display,
        reason,
        "viewer_texture_load_failed_using_fallback"
    );
}

/// Stable stand-in color for a texture that could not be loaded.
fn fallback_color(key: &str) -> Rgba {
    let hash = key
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193));
    let [r, g, b, _] = hash.to_le_bytes();
    [64 + r / 2, 64 + g / 2, 64 + b / 2, 255]
}

fn byte_len(size: Size) -> usize {
    size.width.max(0) as usize * size.height.max(0) as usize * 4
}

fn fill(buffer: &mut [u8], color: Rgba) {
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

fn blend_pixel(pixel: &mut [u8], color: Rgba, opacity: f32) {
    let alpha = (f32::from(color[3]) / 255.0) * opacity.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let dst = f32::from(pixel[channel]);
        let src = f32::from(color[channel]);
        pixel[channel] = (dst + (src - dst) * alpha).round() as u8;
    }
    let dst_alpha = f32::from(pixel[3]) / 255.0;
    pixel[3] = ((alpha + dst_alpha * (1.0 - alpha)) * 255.0).round() as u8;
}

/// Nearest-neighbour copy of `src_rect` in `src` onto `dest_rect` in `dst`.
fn stretch_blit(
    src: &[u8],
    src_size: Size,
    src_rect: Rect,
    dst: &mut [u8],
    dst_size: Size,
    dest_rect: Rect,
    opacity: f32,
) {
    if src_rect.is_empty() || dest_rect.is_empty() {
        return;
    }
    let left = dest_rect.x.max(0);
    let top = dest_rect.y.max(0);
    let right = (dest_rect.x + dest_rect.width).min(dst_size.width);
    let bottom = (dest_rect.y + dest_rect.height).min(dst_size.height);

    for y in top..bottom {
        let src_y = src_rect.y + (y - dest_rect.y) * src_rect.height / dest_rect.height;
        if src_y < 0 || src_y >= src_size.height {
            continue;
        }
        for x in left..right {
            let src_x = src_rect.x + (x - dest_rect.x) * src_rect.width / dest_rect.width;
            if src_x < 0 || src_x >= src_size.width {
                continue;
            }
            let src_offset = (src_y as usize * src_size.width as usize + src_x as usize) * 4;
            let dst_offset = (y as usize * dst_size.width as usize + x as usize) * 4;
            let (Some(texel), Some(pixel)) = (
                src.get(src_offset..src_offset + 4),
                dst.get_mut(dst_offset..dst_offset + 4),
            ) else {
                continue;
            };
            blend_pixel(pixel, [texel[0], texel[1], texel[2], texel[3]], opacity);
        }
    }
}

struct Canvas<'a> {
    pixels: &'a mut [u8],
    size: Size,
    clip: Rect,
}

impl<'a> Canvas<'a> {
    fn new(pixels: &'a mut [u8], size: Size, clip: Rect) -> Self {
        Self { pixels, size, clip }
    }

    fn bounds(&self, rect: Rect) -> Option<(i32, i32, i32, i32)> {
        let left = rect.x.max(self.clip.x).max(0);
        let top = rect.y.max(self.clip.y).max(0);
        let right = (rect.x + rect.width)
            .min(self.clip.x + self.clip.width)
            .min(self.size.width);
        let bottom = (rect.y + rect.height)
            .min(self.clip.y + self.clip.height)
            .min(self.size.height);
        (left < right && top < bottom).then_some((left, top, right, bottom))
    }

    fn pixel_mut(&mut self, x: i32, y: i32) -> Option<&mut [u8]> {
        let offset = (y as usize * self.size.width as usize + x as usize) * 4;
        self.pixels.get_mut(offset..offset + 4)
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba, opacity: f32) {
        let Some((left, top, right, bottom)) = self.bounds(rect) else {
            return;
        };
        for y in top..bottom {
            for x in left..right {
                if let Some(pixel) = self.pixel_mut(x, y) {
                    blend_pixel(pixel, color, opacity);
                }
            }
        }
    }

    fn draw_texture(&mut self, rect: Rect, texture: &LoadedTexture, opacity: f32) {
        if texture.width == 0 || texture.height == 0 {
            return;
        }
        let Some((left, top, right, bottom)) = self.bounds(rect) else {
            return;
        };
        for y in top..bottom {
            let tex_y = ((y - rect.y) as u32 * texture.height / rect.height as u32).min(texture.height - 1);
            for x in left..right {
                let tex_x = ((x - rect.x) as u32 * texture.width / rect.width as u32).min(texture.width - 1);
                let offset = (tex_y as usize * texture.width as usize + tex_x as usize) * 4;
                let Some(texel) = texture.rgba.get(offset..offset + 4) else {
                    continue;
                };
                let color = [texel[0], texel[1], texel[2], texel[3]];
                if let Some(pixel) = self.pixel_mut(x, y) {
                    blend_pixel(pixel, color, opacity);
                }
            }
        }
    }

    fn draw_text(&mut self, mut x: i32, y: i32, clip: Rect, text: &str, color: Rgba, opacity: f32) {
        let previous = self.clip;
        if !clip.is_empty() {
            self.clip = intersect(self.clip, clip);
        }
        for ch in text.chars() {
            let rows = glyph_rows(ch.to_ascii_uppercase());
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    let dot = Rect::new(
                        x + col * TEXT_SCALE,
                        y + row as i32 * TEXT_SCALE,
                        TEXT_SCALE,
                        TEXT_SCALE,
                    );
                    self.fill_rect(dot, color, opacity);
                }
            }
            x += GLYPH_ADVANCE;
        }
        self.clip = previous;
    }
}

fn intersect(a: Rect, b: Rect) -> Rect {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);
    Rect::new(left, top, (right - left).max(0), (bottom - top).max(0))
}

/// 3x5 bitmap rows, most significant bit on the left. Unknown characters render blank.
fn glyph_rows(ch: char) -> [u8; GLYPH_HEIGHT as usize] {
    match ch {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b110, 0b001, 0b010, 0b100, 0b111],
        '3' => [0b110, 0b001, 0b010, 0b001, 0b110],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b110, 0b001, 0b110],
        '6' => [0b011, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b110],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        _ => [0; GLYPH_HEIGHT as usize],
    }
}
