use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::position::{Direction, Position};
use crate::types::{AwareRange, Point, Rect, Size};

use super::MapView;

pub const TILE_PIXELS: i32 = 32;
pub const DRAW_DIMENSION_PADDING: i32 = 3;
pub const MIN_VISIBLE_DIMENSION: i32 = 3;
pub const DEFAULT_VISIBLE_DIMENSION: Size = Size::new(15, 11);

const NEAR_VIEW_AREA: i64 = 32 * 32;
const MID_VIEW_AREA: i64 = 64 * 64;
const FAR_VIEW_AREA: i64 = 128 * 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("visible dimension must be odd, got {width}x{height}")]
    EvenVisibleDimension { width: i32, height: i32 },
    #[error("visible dimension {width}x{height} is below the {min}x{min} minimum")]
    BelowMinimumDimension { width: i32, height: i32, min: i32 },
    #[error("map buffer {width}x{height} exceeds the maximum surface size {max}")]
    SurfaceTooLarge { width: i32, height: i32, max: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Near,
    Mid,
    Far,
    Huge,
}

impl ViewMode {
    pub fn classify(tile_size: i32, visible_dimension: Size) -> ViewMode {
        let area = i64::from(visible_dimension.width) * i64::from(visible_dimension.height);
        if tile_size >= TILE_PIXELS && area <= NEAR_VIEW_AREA {
            ViewMode::Near
        } else if tile_size >= 16 && area <= MID_VIEW_AREA {
            ViewMode::Mid
        } else if tile_size >= 8 && area <= FAR_VIEW_AREA {
            ViewMode::Far
        } else {
            ViewMode::Huge
        }
    }
}

pub fn validate_visible_dimension(visible: Size) -> Result<(), GeometryError> {
    let Size { width, height } = visible;
    if width.rem_euclid(2) != 1 || height.rem_euclid(2) != 1 {
        return Err(GeometryError::EvenVisibleDimension { width, height });
    }
    if width < MIN_VISIBLE_DIMENSION || height < MIN_VISIBLE_DIMENSION {
        return Err(GeometryError::BelowMinimumDimension {
            width,
            height,
            min: MIN_VISIBLE_DIMENSION,
        });
    }
    Ok(())
}

/// Pixel size of one tile at `render_scale` percent, never below one pixel.
pub fn tile_size_for_scale(render_scale: u8) -> i32 {
    ((TILE_PIXELS as f32 * (f32::from(render_scale) / 100.0)) as i32).max(1)
}

/// Derived sizes of the off-screen map buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewGeometry {
    pub visible_dimension: Size,
    pub draw_dimension: Size,
    pub tile_size: i32,
    pub scale_factor: f32,
    pub virtual_center_offset: Point,
    pub visible_center_offset: Point,
    pub rect_dimension: Rect,
    pub optimized_size: Size,
}

impl ViewGeometry {
    pub fn compute(
        visible_dimension: Size,
        optimized_size: Size,
        render_scale: u8,
        max_surface_size: u32,
    ) -> Result<Self, GeometryError> {
        let tile_size = tile_size_for_scale(render_scale);
        // Sized in i64 so huge dimensions are rejected instead of overflowing.
        let buffer_side =
            |side: i32| (i64::from(side) + i64::from(DRAW_DIMENSION_PADDING)) * i64::from(tile_size);
        let (buffer_width, buffer_height) = (
            buffer_side(visible_dimension.width),
            buffer_side(visible_dimension.height),
        );
        let max = i64::from(max_surface_size).min(i64::from(i32::MAX));
        if buffer_width > max || buffer_height > max {
            return Err(GeometryError::SurfaceTooLarge {
                width: i32::try_from(buffer_width).unwrap_or(i32::MAX),
                height: i32::try_from(buffer_height).unwrap_or(i32::MAX),
                max: max_surface_size,
            });
        }
        let draw_dimension = visible_dimension + Size::square(DRAW_DIMENSION_PADDING);
        let buffer_size = draw_dimension * tile_size;

        let virtual_center_offset = (draw_dimension / 2 - Size::square(1)).to_point();
        Ok(Self {
            visible_dimension,
            draw_dimension,
            tile_size,
            scale_factor: tile_size as f32 / TILE_PIXELS as f32,
            virtual_center_offset,
            visible_center_offset: virtual_center_offset,
            rect_dimension: Rect::from_point_size(Point::default(), buffer_size),
            optimized_size,
        })
    }

    pub fn buffer_size(&self) -> Size {
        self.rect_dimension.size()
    }

    /// Buffer-space pixel of the top-left corner of `position` as seen from `camera`.
    ///
    /// Floors above the camera shift up and left by one tile per floor.
    pub fn transform_position_to_2d(&self, position: Position, camera: Position) -> Point {
        let floor_delta = i32::from(camera.z) - i32::from(position.z);
        Point::new(
            (self.virtual_center_offset.x + (position.x - camera.x) - floor_delta) * self.tile_size,
            (self.virtual_center_offset.y + (position.y - camera.y) - floor_delta) * self.tile_size,
        )
    }

    /// Sub-rectangle of the buffer that maps onto a destination of `dest_size`.
    ///
    /// `pan_offset` is the already scaled walk or manual pan offset.
    pub fn framebuffer_source(&self, dest_size: Size, pan_offset: Point) -> Rect {
        let margin = self.draw_dimension - self.visible_dimension - Size::square(1);
        let mut draw_offset = (margin / 2).to_point() * self.tile_size + pan_offset;

        let src_visible = self.visible_dimension * self.tile_size;
        let src_size = dest_size.scaled_to_fit(src_visible);
        draw_offset.x += (src_visible.width - src_size.width) / 2;
        draw_offset.y += (src_visible.height - src_size.height) / 2;

        Rect::from_point_size(draw_offset, src_size)
    }

    /// Tile offset from the camera under `point` of a map widget sized `map_size`.
    pub fn tile_offset_at(&self, point: Point, map_size: Size, src_rect: Rect) -> Option<Point> {
        if map_size.is_empty() || self.tile_size <= 0 {
            return None;
        }
        let horizontal = src_rect.width as f32 / map_size.width as f32;
        let vertical = src_rect.height as f32 / map_size.height as f32;
        let framebuffer = Point::new(
            (point.x as f32 * horizontal) as i32,
            (point.y as f32 * vertical) as i32,
        );
        let center_offset = (framebuffer + src_rect.top_left()) / self.tile_size;
        Some(
            self.visible_center_offset - self.draw_dimension.to_point()
                + center_offset
                + Point::new(2, 2),
        )
    }
}

/// Mapping from the buffer's source rect into the destination rect of the last frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCache {
    pub rect: Rect,
    pub src_rect: Rect,
    pub draw_offset: Point,
    pub horizontal_stretch_factor: f32,
    pub vertical_stretch_factor: f32,
}

impl RectCache {
    pub fn new(rect: Rect, src_rect: Rect) -> Self {
        Self {
            rect,
            src_rect,
            draw_offset: src_rect.top_left(),
            horizontal_stretch_factor: stretch_factor(rect.width, src_rect.width),
            vertical_stretch_factor: stretch_factor(rect.height, src_rect.height),
        }
    }

    pub fn map_to_dest(&self, buffer_point: Point) -> Point {
        let relative = buffer_point - self.draw_offset;
        Point::new(
            (relative.x as f32 * self.horizontal_stretch_factor) as i32,
            (relative.y as f32 * self.vertical_stretch_factor) as i32,
        ) + self.rect.top_left()
    }
}

fn stretch_factor(dest: i32, src: i32) -> f32 {
    if src > 0 {
        dest as f32 / src as f32
    } else {
        1.0
    }
}

fn derive_aware_range(world: AwareRange, draw_dimension: Size) -> AwareRange {
    let half = |side: i32| u16::try_from(side / 2 - 1).unwrap_or(0);
    let left = world.left.min(half(draw_dimension.width));
    let top = world.top.min(half(draw_dimension.height));
    AwareRange {
        left,
        right: left + 1,
        top,
        bottom: top + 1,
    }
}

impl MapView {
    pub(super) fn update_geometry(
        &mut self,
        visible_dimension: Size,
        optimized_size: Size,
    ) -> Result<(), GeometryError> {
        validate_visible_dimension(visible_dimension)
            .inspect_err(|error| warn!(error = %error, "visible_dimension_rejected"))?;
        let geometry = ViewGeometry::compute(
            visible_dimension,
            optimized_size,
            self.render_scale,
            self.caps.max_texture_size,
        )
        .inspect_err(|error| warn!(error = %error, "map_view_max_zoom_out_reached"))?;
        self.apply_geometry(geometry);
        Ok(())
    }

    fn apply_geometry(&mut self, geometry: ViewGeometry) {
        if self.auto_view_mode {
            self.view_mode = ViewMode::classify(geometry.tile_size, geometry.visible_dimension);
            self.multifloor = self.view_mode < ViewMode::Far;
        }

        self.geometry = geometry;
        self.pools.map.resize(geometry.buffer_size());
        if let Some(light_view) = self.light_view.as_mut() {
            light_view.resize(geometry.buffer_size(), geometry.tile_size);
        }
        self.aware_range = derive_aware_range(self.world_aware_range, geometry.draw_dimension);
        self.rect_cache = None;
        self.update_viewport_direction_cache();
        self.request_visible_tiles_cache_update();

        debug!(
            visible_width = geometry.visible_dimension.width,
            visible_height = geometry.visible_dimension.height,
            draw_width = geometry.draw_dimension.width,
            draw_height = geometry.draw_dimension.height,
            tile_size = geometry.tile_size,
            view_mode = ?self.view_mode,
            "map_view_geometry_updated"
        );
    }

    /// Rejects even or sub-minimum dimensions without touching the current geometry.
    pub fn set_visible_dimension(&mut self, visible_dimension: Size) -> Result<(), GeometryError> {
        if visible_dimension == self.geometry.visible_dimension {
            return Ok(());
        }
        if let Err(error) = validate_visible_dimension(visible_dimension) {
            warn!(
                width = visible_dimension.width,
                height = visible_dimension.height,
                error = %error,
                "visible_dimension_rejected"
            );
            return Err(error);
        }
        self.update_geometry(visible_dimension, self.geometry.optimized_size)
    }

    /// Applies a visible dimension and render scale together, or neither.
    pub fn set_geometry(
        &mut self,
        visible_dimension: Size,
        render_scale: u8,
    ) -> Result<(), GeometryError> {
        validate_visible_dimension(visible_dimension)
            .inspect_err(|error| warn!(error = %error, "visible_dimension_rejected"))?;
        let geometry = ViewGeometry::compute(
            visible_dimension,
            self.geometry.optimized_size,
            render_scale,
            self.caps.max_texture_size,
        )
        .inspect_err(|error| warn!(error = %error, "map_view_max_zoom_out_reached"))?;
        self.render_scale = render_scale;
        self.apply_geometry(geometry);
        Ok(())
    }

    pub fn optimize_for_size(&mut self, size: Size) -> Result<(), GeometryError> {
        self.update_geometry(self.geometry.visible_dimension, size)
    }

    /// Percent of [`TILE_PIXELS`]; the previous scale is kept when the buffer would not fit.
    pub fn set_render_scale(&mut self, render_scale: u8) -> Result<(), GeometryError> {
        let previous = self.render_scale;
        self.render_scale = render_scale;
        let result = self.update_geometry(self.geometry.visible_dimension, self.geometry.optimized_size);
        if result.is_err() {
            self.render_scale = previous;
        }
        result
    }

    pub fn set_anti_aliasing(&mut self, enable: bool) {
        self.pools.map.set_smooth(enable);
        // Only fails while the view is still unsized; the rejection is logged.
        let _ = self.update_geometry(self.geometry.visible_dimension, self.geometry.optimized_size);
    }

    pub fn is_anti_aliasing(&self) -> bool {
        self.pools.map.smooth()
    }

    pub fn set_auto_view_mode(&mut self, enable: bool) {
        self.auto_view_mode = enable;
        if enable {
            let _ = self.update_geometry(self.geometry.visible_dimension, self.geometry.optimized_size);
        }
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
        self.request_visible_tiles_cache_update();
    }

    /// Replaces the world's aware range and re-derives the view's own range from it.
    pub fn set_world_aware_range(&mut self, range: AwareRange) {
        self.world_aware_range = range;
        self.aware_range = derive_aware_range(range, self.geometry.draw_dimension);
        self.update_viewport_direction_cache();
        self.request_visible_tiles_cache_update();
    }

    pub fn transform_position_to_2d(&self, position: Position, camera: Position) -> Point {
        self.geometry.transform_position_to_2d(position, camera)
    }

    pub fn calc_framebuffer_source(&self, dest_size: Size) -> Rect {
        let scale_factor = self.geometry.scale_factor;
        let pan_offset = match self.following_creature() {
            Some(creature) => creature.walk_offset().scaled(scale_factor),
            None if !self.move_offset.is_zero() => self.move_offset.scaled(scale_factor),
            None => Point::default(),
        };
        self.geometry.framebuffer_source(dest_size, pan_offset)
    }

    /// World tile under `point` of a map widget sized `map_size`, on the camera's floor.
    pub fn get_position(&self, point: Point, map_size: Size) -> Option<Position> {
        let camera = self.camera_position()?;
        let src_rect = self.calc_framebuffer_source(map_size);
        let offset = self.geometry.tile_offset_at(point, map_size, src_rect)?;
        Some(camera.translated(offset.x, offset.y)).filter(|pos| pos.is_valid())
    }

    pub(super) fn refresh_rect_cache(&mut self, rect: Rect) -> RectCache {
        match self.rect_cache {
            Some(cache) if cache.rect == rect => cache,
            _ => {
                let cache = RectCache::new(rect, self.calc_framebuffer_source(rect.size()));
                self.rect_cache = Some(cache);
                cache
            }
        }
    }

    /// Pans a free camera by pixels; whole tiles move the camera position itself.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.move_offset.x += dx;
        self.move_offset.y += dy;

        let tiles = Point::new(self.move_offset.x / TILE_PIXELS, self.move_offset.y / TILE_PIXELS);
        if !tiles.is_zero() {
            if let Some(position) = self.custom_camera_position.as_mut() {
                *position = position.translated(tiles.x, tiles.y);
            }
            self.move_offset.x %= TILE_PIXELS;
            self.move_offset.y %= TILE_PIXELS;
            self.request_visible_tiles_cache_update();
        }

        self.rect_cache = None;
        self.on_camera_move(self.move_offset);
    }

    pub fn move_offset(&self) -> Point {
        self.move_offset
    }

    /// Called by the host whenever the followed creature steps or the camera pans.
    pub fn on_camera_move(&mut self, offset: Point) {
        self.rect_cache = None;
        if let Some(creature) = self.following_creature() {
            let direction = if creature.is_walking() {
                creature.direction()
            } else {
                Direction::Invalid
            };
            self.viewport = self.viewport_by_direction[direction.index()];
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.on_camera_move(offset);
        }
    }

    fn update_viewport_direction_cache(&mut self) {
        let aware = self.aware_range;
        for direction in Direction::ALL {
            let mut viewport = AwareRange {
                left: aware.right,
                right: aware.right,
                top: aware.top,
                bottom: aware.top,
            };
            match direction {
                Direction::North | Direction::South => {
                    viewport.top += 1;
                    viewport.bottom += 1;
                }
                Direction::West | Direction::East => {
                    viewport.right += 1;
                    viewport.left += 1;
                }
                Direction::NorthEast
                | Direction::SouthEast
                | Direction::NorthWest
                | Direction::SouthWest => {
                    viewport.left += 1;
                    viewport.bottom += 1;
                    viewport.top += 1;
                    viewport.right += 1;
                }
                Direction::Invalid => {
                    viewport.left = viewport.left.saturating_sub(1);
                    viewport.right = viewport.right.saturating_sub(1);
                }
            }
            self.viewport_by_direction[direction.index()] = viewport;
        }
        self.viewport = self.viewport_by_direction[Direction::Invalid.index()];
    }
}
