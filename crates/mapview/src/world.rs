//! Contracts the view consumes from the world model.
//!
//! The world owns tiles and creatures through `Rc`. The view only keeps `Weak`
//! references in its caches, so a tile or creature removed from the world simply
//! disappears from the next frame.

use std::rc::Rc;

use crate::draw::DrawPool;
use crate::light::LightView;
use crate::position::{Direction, Position};
use crate::types::{AwareRange, Point, Rect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroundInfo {
    pub translucent: bool,
    pub top_ground: bool,
}

pub trait MapTile {
    fn position(&self) -> Position;

    /// Whether the tile has anything to draw at all.
    fn is_drawable(&self) -> bool;

    fn ground(&self) -> Option<GroundInfo>;

    fn has_ground(&self) -> bool {
        self.ground().is_some()
    }

    fn is_top_ground(&self) -> bool {
        self.ground().is_some_and(|ground| ground.top_ground)
    }

    fn has_ground_border_to_draw(&self) -> bool;

    fn has_bottom_or_top_to_draw(&self) -> bool;

    /// True when tiles on floors above, down to `first_visible_floor`, hide this tile entirely.
    fn is_completely_covered(&self, first_visible_floor: u8) -> bool;

    fn has_light(&self) -> bool;

    /// Whether this tile blocks the view of the floors above it (roofs, walls).
    fn limits_floors_view(&self, is_free_view: bool) -> bool;

    fn is_look_possible(&self) -> bool {
        true
    }

    fn is_clickable(&self) -> bool;

    /// Creatures in insertion order (bottom of the stack first).
    fn creatures(&self) -> &[Rc<dyn MapCreature>];

    fn on_add_visible_tile_list(&self) {}

    fn select(&self, _shift_pressed: bool) {}

    fn unselect(&self) {}

    fn draw_ground(
        &self,
        dest: Point,
        scale_factor: f32,
        pool: &mut DrawPool,
        light: Option<&mut LightView>,
    );

    fn draw_ground_border(
        &self,
        dest: Point,
        scale_factor: f32,
        pool: &mut DrawPool,
        light: Option<&mut LightView>,
    );

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, light: Option<&mut LightView>);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatureInfoFlags {
    pub names: bool,
    pub health_bars: bool,
    pub mana_bar: bool,
}

impl CreatureInfoFlags {
    pub fn any(self) -> bool {
        self.names || self.health_bars || self.mana_bar
    }
}

/// Placement data for a creature's name/health/mana overlay. `point` is in
/// off-screen buffer space; `draw_offset` and the stretch factors map it into `dest_rect`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatureInfoContext {
    pub dest_rect: Rect,
    pub point: Point,
    pub scale_factor: f32,
    pub draw_offset: Point,
    pub horizontal_stretch_factor: f32,
    pub vertical_stretch_factor: f32,
    pub flags: CreatureInfoFlags,
}

impl CreatureInfoContext {
    pub fn dest_point(&self) -> Point {
        let relative = self.point - self.draw_offset;
        Point::new(
            (relative.x as f32 * self.horizontal_stretch_factor) as i32,
            (relative.y as f32 * self.vertical_stretch_factor) as i32,
        ) + self.dest_rect.top_left()
    }
}

pub trait MapCreature {
    fn position(&self) -> Position;

    fn is_walking(&self) -> bool;

    fn direction(&self) -> Direction;

    /// Sub-tile pixel offset of an in-progress walk, unscaled.
    fn walk_offset(&self) -> Point;

    fn draw_information(&self, context: &CreatureInfoContext, pool: &mut DrawPool);
}

pub trait MapMissile {
    fn position(&self) -> Position;

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, light: Option<&mut LightView>);
}

pub trait MapText {
    fn position(&self) -> Position;

    /// Static texts with no message mode are skipped.
    fn is_visible(&self) -> bool {
        true
    }

    fn draw_text(&self, dest: Point, clip: Rect, pool: &mut DrawPool);
}

pub trait MapStore {
    fn tile(&self, pos: Position) -> Option<Rc<dyn MapTile>>;

    fn is_look_possible(&self, pos: Position) -> bool {
        self.tile(pos).map_or(true, |tile| tile.is_look_possible())
    }

    /// Default aware range of the world protocol.
    fn aware_range(&self) -> AwareRange {
        AwareRange::default()
    }

    fn spectators_in_range_ex(
        &self,
        center: Position,
        multi_floor: bool,
        min_x_range: i32,
        max_x_range: i32,
        min_y_range: i32,
        max_y_range: i32,
    ) -> Vec<Rc<dyn MapCreature>>;

    fn floor_missiles(&self, z: u8) -> &[Rc<dyn MapMissile>];

    fn static_texts(&self) -> &[Rc<dyn MapText>];

    fn animated_texts(&self) -> &[Rc<dyn MapText>];
}
