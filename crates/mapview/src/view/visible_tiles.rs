use std::rc::{Rc, Weak};

use tracing::debug;

use crate::position::{Position, FLOOR_COUNT};
use crate::world::{MapCreature, MapStore, MapTile};

use super::{sight_range, MapView};

/// Tiles of one floor bucketed by draw stage, each bucket in back-to-front order.
#[derive(Default)]
pub struct FloorTiles {
    pub grounds: Vec<Weak<dyn MapTile>>,
    pub borders: Vec<Weak<dyn MapTile>>,
    pub bottom_tops: Vec<Weak<dyn MapTile>>,
}

impl FloorTiles {
    /// Empties the buckets but keeps their capacity for the next rebuild.
    pub fn clear(&mut self) {
        self.grounds.clear();
        self.borders.clear();
        self.bottom_tops.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.grounds.is_empty() && self.borders.is_empty() && self.bottom_tops.is_empty()
    }
}

pub struct VisibleTilesCache {
    floors: [FloorTiles; FLOOR_COUNT],
    floor_min: u8,
    floor_max: u8,
    first_visible_floor: u8,
    last_visible_floor: u8,
    creatures: Vec<Weak<dyn MapCreature>>,
    pub(super) tiles_dirty: bool,
    pub(super) creatures_dirty: bool,
    pub(super) last_camera_position: Option<Position>,
    rebuild_count: u64,
}

impl Default for VisibleTilesCache {
    fn default() -> Self {
        Self {
            floors: std::array::from_fn(|_| FloorTiles::default()),
            floor_min: 0,
            floor_max: 0,
            first_visible_floor: 0,
            last_visible_floor: 0,
            creatures: Vec::new(),
            tiles_dirty: true,
            creatures_dirty: true,
            last_camera_position: None,
            rebuild_count: 0,
        }
    }
}

impl VisibleTilesCache {
    pub fn floor(&self, z: u8) -> &FloorTiles {
        &self.floors[usize::from(z).min(FLOOR_COUNT - 1)]
    }

    /// Lowest and highest floor index that kept at least one tile (the camera floor otherwise).
    pub fn floor_range(&self) -> (u8, u8) {
        (self.floor_min, self.floor_max)
    }

    pub fn first_visible_floor(&self) -> u8 {
        self.first_visible_floor
    }

    pub fn last_visible_floor(&self) -> u8 {
        self.last_visible_floor
    }

    /// Visible creatures still alive in the world, in draw order.
    pub fn creatures(&self) -> impl Iterator<Item = Rc<dyn MapCreature>> + '_ {
        self.creatures.iter().filter_map(Weak::upgrade)
    }

    pub fn is_tiles_dirty(&self) -> bool {
        self.tiles_dirty
    }

    pub fn is_creatures_dirty(&self) -> bool {
        self.creatures_dirty
    }

    pub fn last_camera_position(&self) -> Option<Position> {
        self.last_camera_position
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    fn clear_touched_floors(&mut self) {
        for z in self.floor_min..=self.floor_max {
            self.floors[usize::from(z)].clear();
        }
    }
}

/// Grid cells of a `width` x `height` grid in anti-diagonal order.
///
/// Diagonal `d` holds every `(ix, iy)` with `ix + iy == d`, visited with `ix` ascending,
/// so each diagonal runs from its bottom-left cell to its top-right cell.
pub fn diagonal_cells(width: i32, height: i32) -> impl Iterator<Item = (i32, i32)> {
    let diagonals = if width > 0 && height > 0 {
        width + height - 1
    } else {
        0
    };
    (0..diagonals).flat_map(move |diagonal| {
        let first = (diagonal - (height - 1)).max(0);
        let last = diagonal.min(width - 1);
        (first..=last).map(move |ix| (ix, diagonal - ix))
    })
}

impl MapView {
    /// Rebuilds the tiles when a tile change was reported; a creature change alone only
    /// recollects the creature list.
    pub fn refresh_visible_tiles_cache(&mut self, map: &dyn MapStore) {
        if self.cache.tiles_dirty {
            self.update_visible_tiles_cache(map);
        } else if self.cache.creatures_dirty {
            self.update_visible_creatures_cache(map);
        }
    }

    pub fn update_visible_tiles_cache(&mut self, map: &dyn MapStore) {
        let Some(camera) = self.camera_position() else {
            // Stays dirty so the rebuild runs as soon as the camera is known, and the
            // creatures and camera notifications come back with it.
            let cache = &mut self.cache;
            cache.clear_touched_floors();
            cache.creatures.clear();
            cache.creatures_dirty = true;
            cache.last_camera_position = None;
            return;
        };
        self.cache.tiles_dirty = false;

        let previous = self.cache.last_camera_position;
        if previous != Some(camera) {
            self.on_camera_position_changed(map, camera, previous);
        }

        let first = self.calc_first_visible_floor(map);
        let last = self.calc_last_visible_floor(map).max(first);
        let draw_dimension = self.geometry.draw_dimension;
        let center = self.geometry.virtual_center_offset;
        let (left, right, top, bottom) = sight_range(self.aware_range);

        let cache = &mut self.cache;
        cache.last_camera_position = Some(camera);
        cache.first_visible_floor = first;
        cache.last_visible_floor = last;
        cache.clear_touched_floors();
        cache.floor_min = camera.z;
        cache.floor_max = camera.z;

        let collect_creatures = cache.creatures_dirty;
        if collect_creatures {
            cache.creatures.clear();
        }

        for iz in (first..=last).rev() {
            let floor_delta = i32::from(camera.z) - i32::from(iz);
            for (ix, iy) in diagonal_cells(draw_dimension.width, draw_dimension.height) {
                let mut tile_pos = camera.translated(ix - center.x, iy - center.y);
                if !tile_pos.covered_up(floor_delta) {
                    continue;
                }
                let Some(tile) = map.tile(tile_pos) else {
                    continue;
                };
                if !tile.is_drawable() {
                    continue;
                }

                if collect_creatures && camera.is_in_range(tile_pos, left, right, top, bottom, false) {
                    cache
                        .creatures
                        .extend(tile.creatures().iter().rev().map(Rc::downgrade));
                }

                if tile.is_completely_covered(first) && !tile.has_light() {
                    continue;
                }

                let floor = &mut cache.floors[usize::from(iz)];
                if tile.has_ground() {
                    floor.grounds.push(Rc::downgrade(&tile));
                }
                if tile.has_ground_border_to_draw() {
                    floor.borders.push(Rc::downgrade(&tile));
                }
                if tile.has_bottom_or_top_to_draw() {
                    floor.bottom_tops.push(Rc::downgrade(&tile));
                }
                tile.on_add_visible_tile_list();

                cache.floor_min = cache.floor_min.min(iz);
                cache.floor_max = cache.floor_max.max(iz);
            }
        }

        cache.creatures_dirty = false;
        cache.tiles_dirty = false;
        cache.rebuild_count += 1;

        debug!(
            camera_x = camera.x,
            camera_y = camera.y,
            camera_z = camera.z,
            first_visible_floor = first,
            last_visible_floor = last,
            floor_min = cache.floor_min,
            floor_max = cache.floor_max,
            creatures = cache.creatures.len(),
            "visible_tiles_cache_rebuilt"
        );
    }

    /// Recollects the creatures on the camera floor, in the same order as a full rebuild.
    ///
    /// Falls back to a full rebuild when the camera moved since the tiles were bucketed.
    pub fn update_visible_creatures_cache(&mut self, map: &dyn MapStore) {
        let Some(camera) = self.camera_position() else {
            return;
        };
        if self.cache.last_camera_position != Some(camera) {
            self.update_visible_tiles_cache(map);
            return;
        }

        let draw_dimension = self.geometry.draw_dimension;
        let center = self.geometry.virtual_center_offset;
        let (left, right, top, bottom) = sight_range(self.aware_range);
        let cache = &mut self.cache;
        cache.creatures.clear();
        for (ix, iy) in diagonal_cells(draw_dimension.width, draw_dimension.height) {
            let tile_pos = camera.translated(ix - center.x, iy - center.y);
            if !camera.is_in_range(tile_pos, left, right, top, bottom, false) {
                continue;
            }
            let Some(tile) = map.tile(tile_pos) else {
                continue;
            };
            if tile.is_drawable() {
                cache
                    .creatures
                    .extend(tile.creatures().iter().rev().map(Rc::downgrade));
            }
        }
        cache.creatures_dirty = false;

        debug!(
            camera_x = camera.x,
            camera_y = camera.y,
            camera_z = camera.z,
            creatures = cache.creatures.len(),
            "visible_creatures_recollected"
        );
    }

    fn on_camera_position_changed(
        &mut self,
        map: &dyn MapStore,
        camera: Position,
        previous: Option<Position>,
    ) {
        if let Some(mouse) = self.mouse_position {
            let carried = match previous {
                Some(previous) if previous.z == camera.z => {
                    Some(mouse.translated_to_direction(previous.direction_to(camera)))
                }
                Some(previous) => {
                    let z = i32::from(mouse.z) + i32::from(camera.z) - i32::from(previous.z);
                    u8::try_from(z)
                        .ok()
                        .map(|z| Position { z, ..mouse })
                        .filter(|pos| pos.is_valid())
                }
                None => Some(mouse),
            };
            self.on_mouse_move(map, carried, true);
        }

        if let Some(observer) = self.observer.as_mut() {
            observer.on_position_change(camera, previous);
        }

        let previous_floor = previous.map(|pos| pos.z);
        if previous_floor != Some(camera.z) {
            self.on_floor_change(camera.z, previous_floor);
        }
    }
}
