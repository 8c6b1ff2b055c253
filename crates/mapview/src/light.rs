use crate::draw::DrawPool;
use crate::types::{Light, Point, Rect, Size};
use crate::view::RectCache;

const SHADE_ALPHA: u8 = 96;
const LIGHT_SOURCE_ALPHA: u8 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shade {
    pub floor: u8,
    pub point: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSource {
    pub floor: u8,
    pub point: Point,
    pub light: Light,
}

/// Per-frame light bookkeeping for the map buffer.
///
/// Shades and light sources are collected in buffer coordinates while floors are
/// drawn and turned into an overlay by [`LightView::draw`].
#[derive(Debug, Clone, Default)]
pub struct LightView {
    buffer_size: Size,
    tile_size: i32,
    floor: u8,
    global_light: Light,
    shades: Vec<Shade>,
    sources: Vec<LightSource>,
}

impl LightView {
    pub fn new(buffer_size: Size, tile_size: i32) -> Self {
        Self {
            buffer_size,
            tile_size,
            ..Self::default()
        }
    }

    pub fn resize(&mut self, buffer_size: Size, tile_size: i32) {
        self.buffer_size = buffer_size;
        self.tile_size = tile_size;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.shades.clear();
        self.sources.clear();
    }

    pub fn set_floor(&mut self, floor: u8) {
        self.floor = floor;
    }

    pub fn floor(&self) -> u8 {
        self.floor
    }

    pub fn set_global_light(&mut self, light: Light) {
        self.global_light = light;
    }

    pub fn global_light(&self) -> Light {
        self.global_light
    }

    pub fn set_shade(&mut self, point: Point) {
        self.shades.push(Shade {
            floor: self.floor,
            point,
        });
    }

    pub fn add_light_source(&mut self, point: Point, light: Light) {
        if light.intensity == 0 {
            return;
        }
        self.sources.push(LightSource {
            floor: self.floor,
            point,
            light,
        });
    }

    pub fn shades(&self) -> &[Shade] {
        &self.shades
    }

    pub fn sources(&self) -> &[LightSource] {
        &self.sources
    }

    pub fn buffer_size(&self) -> Size {
        self.buffer_size
    }

    pub fn draw(&self, rect_cache: &RectCache, pool: &mut DrawPool) {
        pool.begin(rect_cache.rect, rect_cache.src_rect);

        let darkness = 255 - self.global_light.intensity;
        if darkness > 0 {
            pool.add_filled_rect(rect_cache.rect, [0, 0, 0, darkness]);
        }

        let tile_size = Size::new(
            (self.tile_size as f32 * rect_cache.horizontal_stretch_factor) as i32,
            (self.tile_size as f32 * rect_cache.vertical_stretch_factor) as i32,
        );
        for shade in &self.shades {
            let top_left = rect_cache.map_to_dest(shade.point);
            pool.add_filled_rect(
                Rect::from_point_size(top_left, tile_size),
                [0, 0, 0, SHADE_ALPHA],
            );
        }

        for source in &self.sources {
            let radius = i32::from(source.light.intensity);
            let top_left = rect_cache.map_to_dest(source.point)
                - Point::new(tile_size.width * radius, tile_size.height * radius);
            let size = Size::new(
                tile_size.width * (2 * radius + 1),
                tile_size.height * (2 * radius + 1),
            );
            pool.add_filled_rect(
                Rect::from_point_size(top_left, size),
                source.light.rgba(LIGHT_SOURCE_ALPHA),
            );
        }
    }
}
