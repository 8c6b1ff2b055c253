mod compositor;
mod floors;
mod geometry;
mod shader_fade;
mod visible_tiles;


use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::asset_keys::{validate_asset_key, AssetKeyError};
use crate::draw::{DrawPools, ShaderId, TextureKey};
use crate::light::LightView;
use crate::position::{Direction, Position, SEA_FLOOR};
use crate::types::{AwareRange, Light, Point};
use crate::world::{MapCreature, MapStore, MapTile};

pub use floors::{first_visible_floor, last_visible_floor};
pub use geometry::{
    tile_size_for_scale, validate_visible_dimension, GeometryError, RectCache, ViewGeometry,
    ViewMode, DEFAULT_VISIBLE_DIMENSION, DRAW_DIMENSION_PADDING, MIN_VISIBLE_DIMENSION,
    TILE_PIXELS,
};
pub use shader_fade::{ActiveShader, ShaderFade};
pub use visible_tiles::{diagonal_cells, FloorTiles, VisibleTilesCache};

pub const DEFAULT_RENDER_SCALE: u8 = 100;
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 4096;

/// Host graphics capabilities the view needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCaps {
    pub shaders_supported: bool,
    pub shaders_enabled: bool,
    pub max_texture_size: u32,
}

impl Default for RenderCaps {
    fn default() -> Self {
        Self {
            shaders_supported: true,
            shaders_enabled: true,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawToggles {
    pub names: bool,
    pub health_bars: bool,
    pub mana_bar: bool,
    pub texts: bool,
    pub highlight_target: bool,
}

impl Default for DrawToggles {
    fn default() -> Self {
        Self {
            names: true,
            health_bars: true,
            mana_bar: true,
            texts: true,
            highlight_target: false,
        }
    }
}

/// Side-effect hooks fired while the view rebuilds and draws.
///
/// Observers only receive values, never the view itself, so they cannot trigger a
/// nested rebuild; any invalidation they cause reaches the view on the next frame.
pub trait MapViewObserver {
    fn on_camera_move(&mut self, _offset: Point) {}

    fn on_position_change(&mut self, _position: Position, _previous: Option<Position>) {}

    fn on_floor_change(&mut self, _floor: u8, _previous: Option<u8>) {}

    fn on_floor_drawing_start(&mut self, _floor: u8) {}

    fn on_floor_drawing_end(&mut self, _floor: u8) {}
}

enum CameraSource {
    Custom,
    Following(Weak<dyn MapCreature>),
}

/// Viewport onto the world map: visibility caching, floor resolution and frame composition.
pub struct MapView {
    geometry: ViewGeometry,
    caps: RenderCaps,
    render_scale: u8,
    world_aware_range: AwareRange,
    aware_range: AwareRange,
    viewport: AwareRange,
    viewport_by_direction: [AwareRange; 9],
    view_mode: ViewMode,
    auto_view_mode: bool,
    multifloor: bool,
    camera: CameraSource,
    custom_camera_position: Option<Position>,
    move_offset: Point,
    locked_first_visible_floor: Option<u8>,
    cache: VisibleTilesCache,
    rect_cache: Option<RectCache>,
    pools: DrawPools,
    shader: ShaderFade,
    light_view: Option<LightView>,
    global_light: Light,
    minimum_ambient_light: f32,
    shadow_floor_intensity: f32,
    toggles: DrawToggles,
    crosshair_texture: Option<TextureKey>,
    mouse_position: Option<Position>,
    last_highlight_tile: Option<Weak<dyn MapTile>>,
    shift_pressed: bool,
    observer: Option<Box<dyn MapViewObserver>>,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new(RenderCaps::default())
    }
}

impl MapView {
    pub fn new(caps: RenderCaps) -> Self {
        let world_aware_range = AwareRange::default();
        let optimized_size = crate::types::Size::new(
            world_aware_range.horizontal(),
            world_aware_range.vertical(),
        ) * TILE_PIXELS;
        let mut view = Self {
            geometry: ViewGeometry::default(),
            caps,
            render_scale: DEFAULT_RENDER_SCALE,
            world_aware_range,
            aware_range: world_aware_range,
            viewport: world_aware_range,
            viewport_by_direction: [world_aware_range; 9],
            view_mode: ViewMode::Near,
            auto_view_mode: false,
            multifloor: true,
            camera: CameraSource::Custom,
            custom_camera_position: None,
            move_offset: Point::default(),
            locked_first_visible_floor: None,
            cache: VisibleTilesCache::default(),
            rect_cache: None,
            pools: DrawPools::default(),
            shader: ShaderFade::default(),
            light_view: None,
            global_light: Light::default(),
            minimum_ambient_light: 0.0,
            shadow_floor_intensity: 0.0,
            toggles: DrawToggles::default(),
            crosshair_texture: None,
            mouse_position: None,
            last_highlight_tile: None,
            shift_pressed: false,
            observer: None,
        };
        // Only fails when the host surface cannot hold the default view; the view then
        // stays at zero size until a smaller dimension is requested.
        let _ = view.update_geometry(DEFAULT_VISIBLE_DIMENSION, optimized_size);
        view
    }

    pub fn set_observer(&mut self, observer: Option<Box<dyn MapViewObserver>>) {
        self.observer = observer;
    }

    pub fn render_caps(&self) -> RenderCaps {
        self.caps
    }

    pub fn set_render_caps(&mut self, caps: RenderCaps) -> Result<(), GeometryError> {
        let previous = self.caps;
        self.caps = caps;
        let result = self.update_geometry(self.geometry.visible_dimension, self.geometry.optimized_size);
        if result.is_err() {
            self.caps = previous;
        }
        result
    }

    // --- camera -------------------------------------------------------------------------

    pub fn follow_creature(&mut self, creature: &Rc<dyn MapCreature>) {
        self.camera = CameraSource::Following(Rc::downgrade(creature));
        self.cache.last_camera_position = None;
        self.request_visible_tiles_cache_update();
    }

    pub fn set_camera_position(&mut self, position: Position) {
        self.camera = CameraSource::Custom;
        self.custom_camera_position = Some(position);
        self.request_visible_tiles_cache_update();
    }

    pub fn following_creature(&self) -> Option<Rc<dyn MapCreature>> {
        match &self.camera {
            CameraSource::Following(creature) => creature.upgrade(),
            CameraSource::Custom => None,
        }
    }

    pub fn is_following_creature(&self) -> bool {
        self.following_creature().is_some()
    }

    /// `None` until a followed creature or an explicit position is known.
    pub fn camera_position(&self) -> Option<Position> {
        let position = match &self.camera {
            CameraSource::Following(creature) => creature.upgrade().map(|c| c.position()),
            CameraSource::Custom => self.custom_camera_position,
        };
        position.filter(|pos| pos.is_valid())
    }

    // --- floors -------------------------------------------------------------------------

    pub fn lock_first_visible_floor(&mut self, floor: u8) {
        self.locked_first_visible_floor = Some(floor);
        self.request_visible_tiles_cache_update();
    }

    pub fn unlock_first_visible_floor(&mut self) {
        self.locked_first_visible_floor = None;
        self.request_visible_tiles_cache_update();
    }

    pub fn locked_first_visible_floor(&self) -> Option<u8> {
        self.locked_first_visible_floor
    }

    pub fn is_multifloor(&self) -> bool {
        self.multifloor
    }

    /// Ignored while auto view mode is on; geometry updates decide it then.
    pub fn set_multifloor(&mut self, enable: bool) {
        if self.auto_view_mode || self.multifloor == enable {
            return;
        }
        self.multifloor = enable;
        self.request_visible_tiles_cache_update();
    }

    // --- invalidation -------------------------------------------------------------------

    pub fn request_visible_tiles_cache_update(&mut self) {
        self.cache.tiles_dirty = true;
    }

    pub fn request_visible_creatures_cache_update(&mut self) {
        self.cache.creatures_dirty = true;
    }

    pub fn on_tile_update(&mut self, _position: Position, thing_is_creature: bool) {
        if thing_is_creature {
            self.request_visible_creatures_cache_update();
        }
        self.request_visible_tiles_cache_update();
    }

    pub fn on_map_center_change(&mut self, _position: Position) {
        self.request_visible_tiles_cache_update();
    }

    pub fn on_global_light_change(&mut self, light: Light) {
        self.global_light = light;
        self.update_light();
    }

    fn on_floor_change(&mut self, floor: u8, previous: Option<u8>) {
        self.request_visible_creatures_cache_update();
        self.update_light();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_floor_change(floor, previous);
        }
    }

    // --- lighting -----------------------------------------------------------------------

    pub fn set_draw_lights(&mut self, enable: bool) {
        if enable == self.light_view.is_some() {
            return;
        }
        self.light_view = enable.then(|| {
            LightView::new(self.geometry.buffer_size(), self.geometry.tile_size)
        });
        self.update_light();
    }

    pub fn is_drawing_lights(&self) -> bool {
        self.light_view.is_some()
    }

    pub fn light_view(&self) -> Option<&LightView> {
        self.light_view.as_ref()
    }

    pub fn set_minimum_ambient_light(&mut self, intensity: f32) {
        self.minimum_ambient_light = intensity.clamp(0.0, 1.0);
        self.update_light();
    }

    pub fn set_shadow_floor_intensity(&mut self, intensity: f32) {
        self.shadow_floor_intensity = intensity.clamp(0.0, 1.0);
    }

    fn update_light(&mut self) {
        let underground = self.camera_position().map_or(true, |pos| pos.z > SEA_FLOOR);
        let minimum = (self.minimum_ambient_light * 255.0) as u8;
        let Some(light_view) = self.light_view.as_mut() else {
            return;
        };
        let mut ambient = if underground {
            Light::default()
        } else {
            self.global_light
        };
        ambient.intensity = ambient.intensity.max(minimum);
        light_view.set_global_light(ambient);
    }

    // --- shader -------------------------------------------------------------------------

    /// Switches the map shader, cross-fading when a fade-out is requested and a shader is active.
    pub fn set_shader(
        &mut self,
        shader: Option<ShaderId>,
        fade_in: Duration,
        fade_out: Duration,
        now: Instant,
    ) {
        let anchor = self.camera_position();
        let next = shader.map(|id| ActiveShader { id, anchor });
        if self.shader.set_shader(next, fade_in, fade_out, now) {
            info!(
                shader = ?self.shader.active().map(|s| s.id.0.as_str()),
                fade_in_ms = fade_in.as_millis() as u64,
                fade_out_ms = fade_out.as_millis() as u64,
                "map_shader_changed"
            );
        }
    }

    pub fn shader_fade(&self) -> &ShaderFade {
        &self.shader
    }

    // --- input & picking ----------------------------------------------------------------

    pub fn set_crosshair_texture(&mut self, path: &str) -> Result<(), AssetKeyError> {
        if path.is_empty() {
            self.crosshair_texture = None;
            return Ok(());
        }
        if let Err(error) = validate_asset_key(path) {
            warn!(path, error = %error, "crosshair_texture_rejected");
            return Err(error);
        }
        self.crosshair_texture = Some(TextureKey(path.to_string()));
        Ok(())
    }

    pub fn crosshair_texture(&self) -> Option<&TextureKey> {
        self.crosshair_texture.as_ref()
    }

    pub fn mouse_position(&self) -> Option<Position> {
        self.mouse_position
    }

    /// `is_virtual` is set when the camera moved under a still mouse.
    pub fn on_mouse_move(&mut self, map: &dyn MapStore, position: Option<Position>, is_virtual: bool) {
        self.mouse_position = position;
        if let Some(tile) = self.last_highlight_tile.take().and_then(|tile| tile.upgrade()) {
            tile.unselect();
        }
        if !self.toggles.highlight_target {
            return;
        }
        let Some(position) = position else {
            return;
        };
        let tile = if self.shift_pressed {
            self.top_tile(map, position)
        } else {
            map.tile(position)
        };
        if let Some(tile) = tile {
            tile.select(self.shift_pressed);
            self.last_highlight_tile = Some(Rc::downgrade(&tile));
            debug!(x = position.x, y = position.y, z = position.z, is_virtual, "map_highlight_moved");
        }
    }

    pub fn on_key_release(&mut self, map: &dyn MapStore, shift_pressed: bool) {
        if shift_pressed != self.shift_pressed {
            self.shift_pressed = shift_pressed;
            self.on_mouse_move(map, self.mouse_position, false);
        }
    }

    /// First clickable tile from the highest drawn floor down, following the cover-up
    /// projection of `position`.
    pub fn top_tile(&self, map: &dyn MapStore, position: Position) -> Option<Rc<dyn MapTile>> {
        let (floor_min, floor_max) = self.cache.floor_range();
        let mut tile_pos = position;
        if !tile_pos.covered_up(i32::from(position.z) - i32::from(floor_min)) {
            return None;
        }
        for _ in floor_min..=floor_max {
            if let Some(tile) = map.tile(tile_pos) {
                if tile.is_clickable() {
                    return Some(tile);
                }
            }
            if !tile_pos.covered_down(1) {
                break;
            }
        }
        None
    }

    // --- spectators ---------------------------------------------------------------------

    pub fn spectators(
        &self,
        map: &dyn MapStore,
        center: Position,
        multi_floor: bool,
    ) -> Vec<Rc<dyn MapCreature>> {
        let range = self.aware_range;
        map.spectators_in_range_ex(
            center,
            multi_floor,
            i32::from(range.left),
            i32::from(range.right),
            i32::from(range.top),
            i32::from(range.bottom),
        )
    }

    pub fn sight_spectators(
        &self,
        map: &dyn MapStore,
        center: Position,
        multi_floor: bool,
    ) -> Vec<Rc<dyn MapCreature>> {
        let (left, right, top, bottom) = sight_range(self.aware_range);
        map.spectators_in_range_ex(center, multi_floor, left, right, top, bottom)
    }

    pub fn is_in_range(&self, position: Position, ignore_z: bool) -> bool {
        let (left, right, top, bottom) = sight_range(self.aware_range);
        self.camera_position()
            .is_some_and(|camera| camera.is_in_range(position, left, right, top, bottom, ignore_z))
    }

    pub fn aware_range(&self) -> AwareRange {
        self.aware_range
    }

    /// Aware range of the followed creature's walking direction, refreshed on camera moves.
    pub fn viewport(&self) -> AwareRange {
        self.viewport
    }

    pub fn viewport_for_direction(&self, direction: Direction) -> AwareRange {
        self.viewport_by_direction[direction.index()]
    }

    // --- toggles & accessors ------------------------------------------------------------

    pub fn draw_toggles(&self) -> DrawToggles {
        self.toggles
    }

    pub fn set_draw_toggles(&mut self, toggles: DrawToggles) {
        self.toggles = toggles;
    }

    pub fn geometry(&self) -> &ViewGeometry {
        &self.geometry
    }

    pub fn render_scale(&self) -> u8 {
        self.render_scale
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn is_auto_view_mode(&self) -> bool {
        self.auto_view_mode
    }

    pub fn visible_tiles_cache(&self) -> &VisibleTilesCache {
        &self.cache
    }

    pub fn rect_cache(&self) -> Option<&RectCache> {
        self.rect_cache.as_ref()
    }

    pub fn draw_pools(&self) -> &DrawPools {
        &self.pools
    }
}

/// Narrowed range used for visibility checks: `(left-1, right-2, top-1, bottom-2)`.
fn sight_range(range: AwareRange) -> (i32, i32, i32, i32) {
    (
        i32::from(range.left) - 1,
        i32::from(range.right) - 2,
        i32::from(range.top) - 1,
        i32::from(range.bottom) - 2,
    )
}
