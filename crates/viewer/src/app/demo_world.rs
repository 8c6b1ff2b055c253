//! Hand-built map the viewer walks around in: a meadow with a roofed house,
//! a pond, a few trees and a lit cave one floor down.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use mapview::{
    CreatureInfoContext, Direction, DrawPool, GroundInfo, Light, LightView, MapCreature,
    MapMissile, MapStore, MapText, MapTile, Point, Position, Rect, Rgba, Size, TextureKey,
    FLOOR_COUNT, SEA_FLOOR, TILE_PIXELS,
};

pub(crate) const SPAWN: Position = Position::new(1000, 1000, SEA_FLOOR);

const MEADOW_RADIUS: i32 = 14;
const HOUSE_MIN: (i32, i32) = (1004, 995);
const HOUSE_MAX: (i32, i32) = (1009, 999);
const CAVE_MIN: (i32, i32) = (992, 996);
const CAVE_MAX: (i32, i32) = (999, 1003);
const CAVE_FLOOR: u8 = SEA_FLOOR + 1;

const GRASS_COLOR: Rgba = [74, 112, 56, 255];
const WATER_COLOR: Rgba = [40, 82, 150, 255];
const PLANKS_COLOR: Rgba = [120, 88, 56, 255];
const ROOF_COLOR: Rgba = [140, 52, 44, 255];
const ROCK_COLOR: Rgba = [70, 66, 62, 255];
const BORDER_COLOR: Rgba = [52, 84, 40, 255];
const SELECTION_COLOR: Rgba = [255, 230, 90, 255];
const TOP_SELECTION_COLOR: Rgba = [255, 140, 60, 255];
const NAME_COLOR: Rgba = [240, 240, 240, 255];
const HEALTH_BACK_COLOR: Rgba = [20, 20, 20, 255];
const HEALTH_COLOR: Rgba = [60, 200, 70, 255];
const MANA_COLOR: Rgba = [70, 90, 230, 255];

const TORCH_LIGHT: Light = Light {
    intensity: 3,
    color: 206,
};
const DUSK_LIGHT: Light = Light {
    intensity: 150,
    color: 215,
};

const BODY_INSET_PX: i32 = 6;
const NAME_GLYPH_ADVANCE_PX: i32 = 8;
const BAR_WIDTH_PX: i32 = 27;
const BAR_HEIGHT_PX: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Grass,
    Water,
    Planks,
    Roof,
    Rock,
}

impl Surface {
    fn color(self) -> Rgba {
        match self {
            Surface::Grass => GRASS_COLOR,
            Surface::Water => WATER_COLOR,
            Surface::Planks => PLANKS_COLOR,
            Surface::Roof => ROOF_COLOR,
            Surface::Rock => ROCK_COLOR,
        }
    }

    fn ground(self) -> GroundInfo {
        GroundInfo {
            translucent: self == Surface::Water,
            top_ground: self == Surface::Roof,
        }
    }
}

/// A tile is immutable once built; moving a creature swaps in a rebuilt tile.
#[derive(Clone)]
pub(crate) struct DemoTile {
    position: Position,
    surface: Surface,
    border: bool,
    item: Option<TextureKey>,
    blocking: bool,
    light: Option<Light>,
    occupants: Vec<Rc<DemoCreature>>,
    creatures: Vec<Rc<dyn MapCreature>>,
    selected: Cell<Option<bool>>,
}

impl DemoTile {
    fn new(position: Position, surface: Surface) -> Self {
        Self {
            position,
            surface,
            border: false,
            item: None,
            blocking: surface == Surface::Water,
            light: None,
            occupants: Vec::new(),
            creatures: Vec::new(),
            selected: Cell::new(None),
        }
    }

    fn with_item(mut self, key: &str, blocking: bool) -> Self {
        self.item = Some(TextureKey(key.to_string()));
        self.blocking = blocking;
        self
    }

    fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    fn with_border(mut self) -> Self {
        self.border = true;
        self
    }

    fn with_occupants(&self, occupants: Vec<Rc<DemoCreature>>) -> Self {
        let creatures = occupants
            .iter()
            .map(|creature| creature.clone() as Rc<dyn MapCreature>)
            .collect();
        Self {
            occupants,
            creatures,
            selected: Cell::new(None),
            ..self.clone()
        }
    }

    fn is_walkable(&self) -> bool {
        !self.blocking && self.surface != Surface::Roof && self.occupants.is_empty()
    }

    fn tile_rect(dest: Point, scale_factor: f32) -> Rect {
        Rect::from_point_size(dest, Size::square(scaled(TILE_PIXELS, scale_factor)))
    }
}

impl MapTile for DemoTile {
    fn position(&self) -> Position {
        self.position
    }

    fn is_drawable(&self) -> bool {
        true
    }

    fn ground(&self) -> Option<GroundInfo> {
        Some(self.surface.ground())
    }

    fn has_ground_border_to_draw(&self) -> bool {
        self.border
    }

    // The selection outline is drawn in the item pass, so every tile takes part in it.
    fn has_bottom_or_top_to_draw(&self) -> bool {
        true
    }

    fn is_completely_covered(&self, _first_visible_floor: u8) -> bool {
        false
    }

    fn has_light(&self) -> bool {
        self.light.is_some()
    }

    fn limits_floors_view(&self, _is_free_view: bool) -> bool {
        self.surface == Surface::Roof
    }

    fn is_clickable(&self) -> bool {
        self.surface != Surface::Water
    }

    fn creatures(&self) -> &[Rc<dyn MapCreature>] {
        &self.creatures
    }

    fn select(&self, shift_pressed: bool) {
        self.selected.set(Some(shift_pressed));
    }

    fn unselect(&self) {
        self.selected.set(None);
    }

    fn draw_ground(
        &self,
        dest: Point,
        scale_factor: f32,
        pool: &mut DrawPool,
        light: Option<&mut LightView>,
    ) {
        pool.add_filled_rect(Self::tile_rect(dest, scale_factor), self.surface.color());
        if let (Some(source), Some(light)) = (self.light, light) {
            light.add_light_source(dest, source);
        }
    }

    fn draw_ground_border(
        &self,
        dest: Point,
        scale_factor: f32,
        pool: &mut DrawPool,
        _light: Option<&mut LightView>,
    ) {
        let tile = scaled(TILE_PIXELS, scale_factor);
        let edge = scaled(3, scale_factor).max(1);
        pool.add_filled_rect(Rect::new(dest.x, dest.y + tile - edge, tile, edge), BORDER_COLOR);
    }

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, _light: Option<&mut LightView>) {
        let rect = Self::tile_rect(dest, scale_factor);
        if let Some(item) = &self.item {
            pool.add_textured_rect(rect, item.clone());
        }

        let inset = scaled(BODY_INSET_PX, scale_factor);
        for creature in &self.occupants {
            let body = Rect::new(
                rect.x + inset,
                rect.y + inset,
                rect.width - 2 * inset,
                rect.height - 2 * inset,
            );
            pool.add_filled_rect(body, creature.color);
        }

        if let Some(shift_pressed) = self.selected.get() {
            let color = if shift_pressed {
                TOP_SELECTION_COLOR
            } else {
                SELECTION_COLOR
            };
            let edge = scaled(2, scale_factor).max(1);
            pool.add_filled_rect(Rect::new(rect.x, rect.y, rect.width, edge), color);
            let bottom = rect.y + rect.height - edge;
            let right = rect.x + rect.width - edge;
            pool.add_filled_rect(Rect::new(rect.x, bottom, rect.width, edge), color);
            pool.add_filled_rect(Rect::new(rect.x, rect.y, edge, rect.height), color);
            pool.add_filled_rect(Rect::new(right, rect.y, edge, rect.height), color);
        }
    }
}

pub(crate) struct DemoCreature {
    name: String,
    color: Rgba,
    health_percent: u8,
    mana_percent: Option<u8>,
    position: Cell<Position>,
    direction: Cell<Direction>,
}

impl DemoCreature {
    fn new(name: &str, color: Rgba, position: Position) -> Self {
        Self {
            name: name.to_string(),
            color,
            health_percent: 100,
            mana_percent: None,
            position: Cell::new(position),
            direction: Cell::new(Direction::South),
        }
    }

    fn with_vitals(mut self, health_percent: u8, mana_percent: Option<u8>) -> Self {
        self.health_percent = health_percent;
        self.mana_percent = mana_percent;
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

impl MapCreature for DemoCreature {
    fn position(&self) -> Position {
        self.position.get()
    }

    fn is_walking(&self) -> bool {
        false
    }

    fn direction(&self) -> Direction {
        self.direction.get()
    }

    fn walk_offset(&self) -> Point {
        Point::default()
    }

    fn draw_information(&self, context: &CreatureInfoContext, pool: &mut DrawPool) {
        let tile = Point::new(
            (TILE_PIXELS as f32 * context.scale_factor * context.horizontal_stretch_factor) as i32,
            (TILE_PIXELS as f32 * context.scale_factor * context.vertical_stretch_factor) as i32,
        );
        let top_center = context.dest_point() + Point::new(tile.x / 2, 0);
        let bar_left = top_center.x - BAR_WIDTH_PX / 2;
        let mut cursor_y = top_center.y - BAR_HEIGHT_PX - 2;

        if context.flags.mana_bar {
            if let Some(mana) = self.mana_percent {
                add_bar(pool, Point::new(bar_left, cursor_y), mana, MANA_COLOR);
                cursor_y -= BAR_HEIGHT_PX + 1;
            }
        }
        if context.flags.health_bars {
            add_bar(pool, Point::new(bar_left, cursor_y), self.health_percent, HEALTH_COLOR);
            cursor_y -= BAR_HEIGHT_PX + 1;
        }
        if context.flags.names {
            let width = self.name.chars().count() as i32 * NAME_GLYPH_ADVANCE_PX;
            let origin = Point::new(top_center.x - width / 2, cursor_y - 12);
            pool.add_text(origin, context.dest_rect, self.name.clone(), NAME_COLOR);
        }
    }
}

fn add_bar(pool: &mut DrawPool, top_left: Point, percent: u8, color: Rgba) {
    pool.add_filled_rect(
        Rect::from_point_size(top_left, Size::new(BAR_WIDTH_PX, BAR_HEIGHT_PX)),
        HEALTH_BACK_COLOR,
    );
    let filled = (BAR_WIDTH_PX - 2) * i32::from(percent.min(100)) / 100;
    pool.add_filled_rect(
        Rect::new(top_left.x + 1, top_left.y + 1, filled, BAR_HEIGHT_PX - 2),
        color,
    );
}

struct DemoMissile {
    position: Position,
    color: Rgba,
}

impl MapMissile for DemoMissile {
    fn position(&self) -> Position {
        self.position
    }

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, _light: Option<&mut LightView>) {
        let size = scaled(10, scale_factor).max(1);
        let offset = (scaled(TILE_PIXELS, scale_factor) - size) / 2;
        pool.add_filled_rect(
            Rect::from_point_size(dest + Point::new(offset, offset), Size::square(size)),
            self.color,
        );
    }
}

struct DemoText {
    position: Position,
    text: String,
    color: Rgba,
}

impl MapText for DemoText {
    fn position(&self) -> Position {
        self.position
    }

    fn draw_text(&self, dest: Point, clip: Rect, pool: &mut DrawPool) {
        pool.add_text(dest, clip, self.text.clone(), self.color);
    }
}

pub(crate) struct DemoWorld {
    tiles: HashMap<Position, Rc<DemoTile>>,
    player: Rc<DemoCreature>,
    creatures: Vec<Rc<DemoCreature>>,
    missiles: Vec<Vec<Rc<dyn MapMissile>>>,
    static_texts: Vec<Rc<dyn MapText>>,
    animated_texts: Vec<Rc<dyn MapText>>,
}

impl DemoWorld {
    pub(crate) fn new() -> Self {
        let player = Rc::new(DemoCreature::new("Knight", [210, 210, 230, 255], SPAWN));
        let mut world = Self {
            tiles: HashMap::new(),
            player: player.clone(),
            creatures: Vec::new(),
            missiles: vec![Vec::new(); FLOOR_COUNT],
            static_texts: Vec::new(),
            animated_texts: Vec::new(),
        };
        world.build_meadow();
        world.build_house();
        world.build_cave();

        world.spawn(player);
        world.spawn(DemoCreature::new("Rat", [130, 110, 90, 255], SPAWN.translated(3, 4)));
        world.spawn(
            DemoCreature::new("Guard", [90, 120, 200, 255], Position::new(1006, 997, SEA_FLOOR))
                .with_vitals(80, Some(70)),
        );

        world.missiles[usize::from(SEA_FLOOR)].push(Rc::new(DemoMissile {
            position: SPAWN.translated(-2, 2),
            color: [255, 120, 30, 255],
        }));
        world.static_texts.push(Rc::new(DemoText {
            position: SPAWN.translated(0, -2),
            text: "Welcome".to_string(),
            color: [255, 255, 0, 255],
        }));
        world.animated_texts.push(Rc::new(DemoText {
            position: SPAWN.translated(3, 3),
            text: "+10".to_string(),
            color: [120, 255, 120, 255],
        }));
        world
    }

    fn build_meadow(&mut self) {
        for dy in -MEADOW_RADIUS..=MEADOW_RADIUS {
            for dx in -MEADOW_RADIUS..=MEADOW_RADIUS {
                let position = SPAWN.translated(dx, dy);
                let in_pond = (dx + 6).pow(2) + (dy - 6).pow(2) <= 6;
                let mut tile = if in_pond {
                    DemoTile::new(position, Surface::Water)
                } else {
                    DemoTile::new(position, Surface::Grass)
                };
                let near_spawn = dx.abs() + dy.abs() <= 2;
                if !in_pond && !near_spawn && (dx * 7 + dy * 3).rem_euclid(23) == 0 {
                    tile = tile.with_item("tiles/tree", true);
                }
                if dx.abs() == MEADOW_RADIUS || dy.abs() == MEADOW_RADIUS {
                    tile = tile.with_border();
                }
                self.put(tile);
            }
        }
        self.put(
            DemoTile::new(SPAWN.translated(2, -1), Surface::Grass)
                .with_item("tiles/lamp", true)
                .with_light(TORCH_LIGHT),
        );
    }

    fn build_house(&mut self) {
        let roof_floor = SEA_FLOOR - 1;
        for y in HOUSE_MIN.1..=HOUSE_MAX.1 {
            for x in HOUSE_MIN.0..=HOUSE_MAX.0 {
                let on_wall =
                    x == HOUSE_MIN.0 || x == HOUSE_MAX.0 || y == HOUSE_MIN.1 || y == HOUSE_MAX.1;
                let is_door = x == HOUSE_MIN.0 + 2 && y == HOUSE_MAX.1;
                let mut tile = DemoTile::new(Position::new(x, y, SEA_FLOOR), Surface::Planks);
                if on_wall && !is_door {
                    tile = tile.with_item("tiles/wall", true);
                }
                if x == HOUSE_MIN.0 + 1 && y == HOUSE_MIN.1 + 1 {
                    tile = tile.with_light(TORCH_LIGHT);
                }
                self.put(tile);
                self.put(DemoTile::new(Position::new(x, y, roof_floor), Surface::Roof));
            }
        }
    }

    fn build_cave(&mut self) {
        for y in CAVE_MIN.1..=CAVE_MAX.1 {
            for x in CAVE_MIN.0..=CAVE_MAX.0 {
                let mut tile = DemoTile::new(Position::new(x, y, CAVE_FLOOR), Surface::Rock);
                if (x + y).rem_euclid(5) == 0 {
                    tile = tile.with_item("tiles/stalagmite", true);
                }
                let torch = (x, y) == (CAVE_MIN.0 + 2, CAVE_MIN.1 + 2)
                    || (x, y) == (CAVE_MAX.0 - 1, CAVE_MAX.1 - 1);
                if torch {
                    tile = tile.with_light(TORCH_LIGHT);
                }
                self.put(tile);
            }
        }
    }

    fn put(&mut self, tile: DemoTile) {
        self.tiles.insert(tile.position, Rc::new(tile));
    }

    fn spawn(&mut self, creature: impl Into<Rc<DemoCreature>>) {
        let creature = creature.into();
        let position = creature.position();
        if let Some(tile) = self.tiles.get(&position).cloned() {
            let mut occupants = tile.occupants.clone();
            occupants.push(creature.clone());
            self.put(tile.with_occupants(occupants));
        }
        self.creatures.push(creature);
    }

    pub(crate) fn player(&self) -> Rc<DemoCreature> {
        self.player.clone()
    }

    pub(crate) fn global_light(&self) -> Light {
        DUSK_LIGHT
    }

    /// Steps the player one tile; returns the vacated and entered positions.
    pub(crate) fn step_player(&mut self, direction: Direction) -> Option<(Position, Position)> {
        let from = self.player.position();
        let to = from.translated_to_direction(direction);
        self.player.direction.set(direction);
        self.relocate_player(from, to)
    }

    /// Climbs to the floor above (`up`) or below when a walkable tile is there.
    pub(crate) fn change_player_floor(&mut self, up: bool) -> Option<(Position, Position)> {
        let from = self.player.position();
        let mut to = from;
        let moved = if up { to.up(1) } else { to.down(1) };
        if !moved {
            return None;
        }
        self.relocate_player(from, to)
    }

    fn relocate_player(&mut self, from: Position, to: Position) -> Option<(Position, Position)> {
        let target = self.tiles.get(&to).cloned()?;
        if !target.is_walkable() {
            return None;
        }
        let source = self.tiles.get(&from).cloned()?;

        let remaining = source
            .occupants
            .iter()
            .filter(|creature| !Rc::ptr_eq(creature, &self.player))
            .cloned()
            .collect();
        self.put(source.with_occupants(remaining));

        let mut occupants = target.occupants.clone();
        occupants.push(self.player.clone());
        self.put(target.with_occupants(occupants));

        self.player.position.set(to);
        Some((from, to))
    }

    #[cfg(test)]
    fn demo_tile(&self, position: Position) -> Option<Rc<DemoTile>> {
        self.tiles.get(&position).cloned()
    }
}

impl MapStore for DemoWorld {
    fn tile(&self, pos: Position) -> Option<Rc<dyn MapTile>> {
        self.tiles.get(&pos).map(|tile| tile.clone() as Rc<dyn MapTile>)
    }

    fn spectators_in_range_ex(
        &self,
        center: Position,
        multi_floor: bool,
        min_x_range: i32,
        max_x_range: i32,
        min_y_range: i32,
        max_y_range: i32,
    ) -> Vec<Rc<dyn MapCreature>> {
        self.creatures
            .iter()
            .filter(|creature| {
                center.is_in_range(
                    creature.position(),
                    min_x_range,
                    max_x_range,
                    min_y_range,
                    max_y_range,
                    multi_floor,
                )
            })
            .map(|creature| creature.clone() as Rc<dyn MapCreature>)
            .collect()
    }

    fn floor_missiles(&self, z: u8) -> &[Rc<dyn MapMissile>] {
        self.missiles
            .get(usize::from(z))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn static_texts(&self) -> &[Rc<dyn MapText>] {
        &self.static_texts
    }

    fn animated_texts(&self) -> &[Rc<dyn MapText>] {
        &self.animated_texts
    }
}

fn scaled(pixels: i32, scale_factor: f32) -> i32 {
    (pixels as f32 * scale_factor) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_tile_holds_the_player() {
        let world = DemoWorld::new();
        let tile = world.demo_tile(SPAWN).expect("spawn tile exists");
        assert_eq!(tile.creatures().len(), 1);
        assert_eq!(world.player().name(), "Knight");
    }

    #[test]
    fn stepping_moves_the_player_between_rebuilt_tiles() {
        let mut world = DemoWorld::new();
        let old_tile = world.tile(SPAWN).expect("spawn tile");
        let weak = Rc::downgrade(&old_tile);
        drop(old_tile);

        let (from, to) = world.step_player(Direction::West).expect("west is walkable");
        assert_eq!(from, SPAWN);
        assert_eq!(to, SPAWN.translated(-1, 0));
        assert!(weak.upgrade().is_none(), "vacated tile is replaced");
        assert!(world.tile(from).expect("tile").creatures().is_empty());
        assert_eq!(world.tile(to).expect("tile").creatures().len(), 1);
        assert_eq!(world.player().direction(), Direction::West);
    }

    #[test]
    fn water_and_walls_block_steps() {
        let mut world = DemoWorld::new();
        let pond = SPAWN.translated(-6, 6);
        assert!(!world.demo_tile(pond).expect("pond").is_walkable());

        let wall = Position::new(HOUSE_MIN.0, HOUSE_MIN.1 + 1, SEA_FLOOR);
        assert!(!world.demo_tile(wall).expect("wall").is_walkable());
    }

    #[test]
    fn roof_limits_view_from_inside_the_house() {
        let world = DemoWorld::new();
        let roof = world
            .tile(Position::new(HOUSE_MIN.0 + 1, HOUSE_MIN.1 + 1, SEA_FLOOR - 1))
            .expect("roof tile");
        assert!(roof.limits_floors_view(false));
        assert!(roof.is_top_ground());
    }

    #[test]
    fn floor_change_requires_a_tile_below() {
        let mut world = DemoWorld::new();
        assert!(world.change_player_floor(false).is_none());
        assert!(world.change_player_floor(true).is_none());

        let mut cave_world = DemoWorld::new();
        for _ in 0..2 {
            cave_world.step_player(Direction::West);
        }
        let (from, to) = cave_world
            .change_player_floor(false)
            .expect("cave lies below");
        assert_eq!(to.z, from.z + 1);
    }

    #[test]
    fn spectators_respect_range_and_floor() {
        let world = DemoWorld::new();
        let near = world.spectators_in_range_ex(SPAWN, false, 1, 1, 1, 1);
        assert_eq!(near.len(), 1);
        let wide = world.spectators_in_range_ex(SPAWN, false, 8, 9, 6, 7);
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn missiles_are_listed_per_floor() {
        let world = DemoWorld::new();
        assert_eq!(world.floor_missiles(SEA_FLOOR).len(), 1);
        assert!(world.floor_missiles(CAVE_FLOOR).is_empty());
        assert!(world.floor_missiles(200).is_empty());
    }
}
