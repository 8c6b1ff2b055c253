use std::rc::Weak;
use std::time::Instant;

use crate::draw::{DrawPools, MapShaderUniforms, ShaderBinding};
use crate::position::{Direction, Position};
use crate::types::{Point, Rect, Size, COLOR_BLACK};
use crate::world::{CreatureInfoContext, CreatureInfoFlags, MapStore};

use super::{MapView, RectCache};

impl MapView {
    /// Composes one frame for the destination rectangle `rect` into the view's draw pools.
    ///
    /// The map pool is always filled (at least with the background); the creature
    /// information, light and text pools stay empty while the camera is unknown.
    pub fn draw(&mut self, map: &dyn MapStore, rect: Rect, now: Instant) -> &DrawPools {
        self.pools.clear_all();
        self.refresh_visible_tiles_cache(map);
        let rect_cache = self.refresh_rect_cache(rect);
        let camera = self.camera_position();

        self.draw_floors(map, &rect_cache, camera, now);

        let Some(camera) = camera else {
            return &self.pools;
        };

        self.draw_creature_information(&rect_cache, camera);
        if let Some(light_view) = self.light_view.as_ref() {
            light_view.draw(&rect_cache, &mut self.pools.light);
        }
        self.draw_texts(map, &rect_cache, camera);
        &self.pools
    }

    fn draw_floors(
        &mut self,
        map: &dyn MapStore,
        rect_cache: &RectCache,
        camera: Option<Position>,
        now: Instant,
    ) {
        self.pools.map.begin(rect_cache.rect, rect_cache.src_rect);
        self.apply_map_shader(rect_cache, camera, now);

        let geometry = self.geometry;
        self.pools.map.add_filled_rect(geometry.rect_dimension, COLOR_BLACK);

        let Some(camera) = camera else {
            return;
        };
        if let Some(light_view) = self.light_view.as_mut() {
            light_view.reset();
        }

        let tile_step = Point::new(geometry.tile_size, geometry.tile_size);
        let (floor_min, floor_max) = self.cache.floor_range();
        for z in (floor_min..=floor_max).rev() {
            if let Some(light_view) = self.light_view.as_mut() {
                if z > floor_min {
                    let above = z - 1;
                    light_view.set_floor(above);
                    for tile in self.cache.floor(above).grounds.iter().filter_map(Weak::upgrade) {
                        let Some(ground) = tile.ground() else {
                            continue;
                        };
                        if ground.translucent {
                            continue;
                        }
                        let position = tile.position();
                        let mut point = geometry.transform_position_to_2d(position, camera);
                        if ground.top_ground {
                            let edge_below = [Direction::South, Direction::East].into_iter().any(|direction| {
                                map.tile(position.translated_to_direction(direction))
                                    .is_some_and(|next| next.has_ground() && !next.is_top_ground())
                            });
                            if edge_below {
                                light_view.set_shade(point);
                            }
                            point -= tile_step;
                        }
                        light_view.set_shade(point);
                    }
                }
            }

            if let Some(observer) = self.observer.as_mut() {
                observer.on_floor_drawing_start(z);
            }

            let mut light = self.light_view.as_mut();
            if let Some(light_view) = light.as_deref_mut() {
                light_view.set_floor(z);
            }

            let pool = &mut self.pools.map;
            let floor = self.cache.floor(z);
            for tile in floor.grounds.iter().filter_map(Weak::upgrade) {
                let dest = geometry.transform_position_to_2d(tile.position(), camera);
                tile.draw_ground(dest, geometry.scale_factor, pool, light.as_deref_mut());
            }
            for tile in floor.borders.iter().filter_map(Weak::upgrade) {
                let dest = geometry.transform_position_to_2d(tile.position(), camera);
                tile.draw_ground_border(dest, geometry.scale_factor, pool, light.as_deref_mut());
            }
            for tile in floor.bottom_tops.iter().filter_map(Weak::upgrade) {
                let dest = geometry.transform_position_to_2d(tile.position(), camera);
                tile.draw(dest, geometry.scale_factor, pool, light.as_deref_mut());
            }
            for missile in map.floor_missiles(z) {
                let dest = geometry.transform_position_to_2d(missile.position(), camera);
                missile.draw(dest, geometry.scale_factor, pool, light.as_deref_mut());
            }

            if self.shadow_floor_intensity > 0.0 && i32::from(z) == i32::from(camera.z) + 1 {
                pool.add_filled_rect(geometry.rect_dimension, COLOR_BLACK);
                pool.set_last_opacity(self.shadow_floor_intensity);
            }

            if let Some(observer) = self.observer.as_mut() {
                observer.on_floor_drawing_end(z);
            }
        }

        if let (Some(texture), Some(mouse)) = (self.crosshair_texture.as_ref(), self.mouse_position) {
            let point = geometry.transform_position_to_2d(mouse, camera);
            let crosshair = Rect::from_point_size(point, Size::square(geometry.tile_size));
            self.pools.map.add_textured_rect(crosshair, texture.clone());
        }
    }

    /// Steps the shader cross-fade; opacity applies even when shaders are unavailable.
    fn apply_map_shader(&mut self, rect_cache: &RectCache, camera: Option<Position>, now: Instant) {
        let opacity = self.shader.advance(now);
        self.pools.map.set_opacity(opacity);

        if !(self.caps.shaders_supported && self.caps.shaders_enabled) {
            return;
        }
        let (Some(active), Some(camera)) = (self.shader.active(), camera) else {
            return;
        };

        let geometry = &self.geometry;
        let width = geometry.rect_dimension.width.max(1) as f32;
        let height = geometry.rect_dimension.height.max(1) as f32;
        let center = rect_cache.src_rect.center();
        let global = Point::new(
            camera.x - geometry.draw_dimension.width / 2,
            -(camera.y - geometry.draw_dimension.height / 2),
        ) * geometry.tile_size;
        let mut walk = geometry.transform_position_to_2d(camera, active.anchor.unwrap_or(camera));
        walk.y = -walk.y;

        let uniforms = MapShaderUniforms {
            map_center_coord: [center.x as f32 / width, 1.0 - center.y as f32 / height],
            map_global_coord: [global.x as f32 / height, global.y as f32 / height],
            map_zoom: geometry.scale_factor,
            map_walk_offset: [walk.x as f32 / width, walk.y as f32 / height],
        };
        let binding = ShaderBinding {
            shader: active.id.clone(),
            uniforms,
        };
        self.pools.map.set_shader(Some(binding));
    }

    fn draw_creature_information(&mut self, rect_cache: &RectCache, camera: Position) {
        let flags = CreatureInfoFlags {
            names: self.toggles.names,
            health_bars: self.toggles.health_bars,
            mana_bar: self.toggles.mana_bar,
        };
        if !flags.any() {
            return;
        }

        let geometry = self.geometry;
        let pool = &mut self.pools.creature_information;
        pool.begin(rect_cache.rect, rect_cache.rect);
        for creature in self.cache.creatures() {
            let context = CreatureInfoContext {
                dest_rect: rect_cache.rect,
                point: geometry.transform_position_to_2d(creature.position(), camera),
                scale_factor: geometry.scale_factor,
                draw_offset: rect_cache.draw_offset,
                horizontal_stretch_factor: rect_cache.horizontal_stretch_factor,
                vertical_stretch_factor: rect_cache.vertical_stretch_factor,
                flags,
            };
            creature.draw_information(&context, pool);
        }
    }

    fn draw_texts(&mut self, map: &dyn MapStore, rect_cache: &RectCache, camera: Position) {
        let static_texts = map.static_texts();
        let animated_texts = map.animated_texts();
        if !self.toggles.texts || (static_texts.is_empty() && animated_texts.is_empty()) {
            return;
        }

        let geometry = self.geometry;
        let pool = &mut self.pools.text;
        pool.begin(rect_cache.rect, rect_cache.rect);
        let texts = static_texts
            .iter()
            .filter(|text| text.is_visible())
            .chain(animated_texts.iter());
        for text in texts {
            let position = text.position();
            if position.z != camera.z {
                continue;
            }
            let point = rect_cache.map_to_dest(geometry.transform_position_to_2d(position, camera));
            text.draw_text(point, rect_cache.rect, pool);
        }
    }
}
