//! Small in-memory world shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::draw::{DrawPool, TextureKey};
use crate::light::LightView;
use crate::position::{Direction, Position, FLOOR_COUNT};
use crate::types::{Light, Point, Rect, Rgba, Size};
use crate::view::MapViewObserver;
use crate::world::{
    CreatureInfoContext, GroundInfo, MapCreature, MapMissile, MapStore, MapText, MapTile,
};

pub const GROUND_COLOR: Rgba = [40, 120, 40, 255];
pub const BORDER_COLOR: Rgba = [90, 90, 60, 255];
pub const MISSILE_COLOR: Rgba = [250, 80, 0, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewLimit {
    Never,
    Always,
    WhenNotFree,
}

pub struct TestTile {
    position: Position,
    ground: Option<GroundInfo>,
    border: bool,
    bottom_top: bool,
    covered: bool,
    light: bool,
    limit: ViewLimit,
    look_possible: bool,
    clickable: bool,
    creatures: Vec<Rc<dyn MapCreature>>,
    pub visible_notifications: Cell<u32>,
    pub selected: Cell<Option<bool>>,
}

impl TestTile {
    pub fn ground(position: Position) -> Self {
        Self {
            position,
            ground: Some(GroundInfo::default()),
            border: false,
            bottom_top: false,
            covered: false,
            light: false,
            limit: ViewLimit::Never,
            look_possible: true,
            clickable: true,
            creatures: Vec::new(),
            visible_notifications: Cell::new(0),
            selected: Cell::new(None),
        }
    }

    pub fn bare(position: Position) -> Self {
        Self {
            ground: None,
            clickable: false,
            ..Self::ground(position)
        }
    }

    pub fn limiting_view(mut self) -> Self {
        self.limit = ViewLimit::Always;
        self
    }

    pub fn limiting_view_when_not_free(mut self) -> Self {
        self.limit = ViewLimit::WhenNotFree;
        self
    }

    pub fn blocking_look(mut self) -> Self {
        self.look_possible = false;
        self
    }

    pub fn with_border(mut self) -> Self {
        self.border = true;
        self
    }

    pub fn with_bottom_top(mut self) -> Self {
        self.bottom_top = true;
        self
    }

    pub fn completely_covered(mut self) -> Self {
        self.covered = true;
        self
    }

    pub fn with_light(mut self) -> Self {
        self.light = true;
        self
    }

    pub fn top_ground(mut self) -> Self {
        self.ground = Some(GroundInfo {
            translucent: false,
            top_ground: true,
        });
        self
    }

    pub fn translucent(mut self) -> Self {
        self.ground = Some(GroundInfo {
            translucent: true,
            top_ground: false,
        });
        self
    }

    pub fn not_clickable(mut self) -> Self {
        self.clickable = false;
        self
    }

    pub fn with_creature(mut self, creature: &Rc<TestCreature>) -> Self {
        self.creatures.push(creature.clone());
        self
    }

    fn tile_rect(dest: Point, scale_factor: f32) -> Rect {
        Rect::from_point_size(dest, Size::square((32.0 * scale_factor) as i32))
    }
}

impl MapTile for TestTile {
    fn position(&self) -> Position {
        self.position
    }

    fn is_drawable(&self) -> bool {
        self.ground.is_some() || self.border || self.bottom_top || !self.creatures.is_empty()
    }

    fn ground(&self) -> Option<GroundInfo> {
        self.ground
    }

    fn has_ground_border_to_draw(&self) -> bool {
        self.border
    }

    fn has_bottom_or_top_to_draw(&self) -> bool {
        self.bottom_top
    }

    fn is_completely_covered(&self, _first_visible_floor: u8) -> bool {
        self.covered
    }

    fn has_light(&self) -> bool {
        self.light
    }

    fn limits_floors_view(&self, is_free_view: bool) -> bool {
        match self.limit {
            ViewLimit::Never => false,
            ViewLimit::Always => true,
            ViewLimit::WhenNotFree => !is_free_view,
        }
    }

    fn is_look_possible(&self) -> bool {
        self.look_possible
    }

    fn is_clickable(&self) -> bool {
        self.clickable
    }

    fn creatures(&self) -> &[Rc<dyn MapCreature>] {
        &self.creatures
    }

    fn on_add_visible_tile_list(&self) {
        self.visible_notifications.set(self.visible_notifications.get() + 1);
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
        pool.add_filled_rect(Self::tile_rect(dest, scale_factor), GROUND_COLOR);
        if let (true, Some(light)) = (self.light, light) {
            light.add_light_source(
                dest,
                Light {
                    intensity: 2,
                    color: 215,
                },
            );
        }
    }

    fn draw_ground_border(
        &self,
        dest: Point,
        scale_factor: f32,
        pool: &mut DrawPool,
        _light: Option<&mut LightView>,
    ) {
        pool.add_filled_rect(Self::tile_rect(dest, scale_factor), BORDER_COLOR);
    }

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, _light: Option<&mut LightView>) {
        let Position { x, y, z } = self.position;
        pool.add_textured_rect(
            Self::tile_rect(dest, scale_factor),
            TextureKey(format!("tile/{x}_{y}_{z}")),
        );
    }
}

pub struct TestCreature {
    pub name: String,
    pub position: Cell<Position>,
    pub walking: Cell<bool>,
    pub direction: Cell<Direction>,
    pub walk_offset: Cell<Point>,
}

impl TestCreature {
    pub fn new(name: &str, position: Position) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            position: Cell::new(position),
            walking: Cell::new(false),
            direction: Cell::new(Direction::South),
            walk_offset: Cell::new(Point::default()),
        })
    }
}

impl MapCreature for TestCreature {
    fn position(&self) -> Position {
        self.position.get()
    }

    fn is_walking(&self) -> bool {
        self.walking.get()
    }

    fn direction(&self) -> Direction {
        self.direction.get()
    }

    fn walk_offset(&self) -> Point {
        self.walk_offset.get()
    }

    fn draw_information(&self, context: &CreatureInfoContext, pool: &mut DrawPool) {
        if context.flags.names {
            pool.add_text(context.dest_point(), context.dest_rect, self.name.clone(), [255; 4]);
        }
    }
}

pub struct TestMissile {
    pub position: Position,
}

impl MapMissile for TestMissile {
    fn position(&self) -> Position {
        self.position
    }

    fn draw(&self, dest: Point, scale_factor: f32, pool: &mut DrawPool, _light: Option<&mut LightView>) {
        let size = (8.0 * scale_factor) as i32;
        pool.add_filled_rect(Rect::from_point_size(dest, Size::square(size)), MISSILE_COLOR);
    }
}

pub struct TestText {
    pub position: Position,
    pub text: String,
    pub visible: bool,
}

impl MapText for TestText {
    fn position(&self) -> Position {
        self.position
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn draw_text(&self, dest: Point, clip: Rect, pool: &mut DrawPool) {
        pool.add_text(dest, clip, self.text.clone(), [255, 255, 0, 255]);
    }
}

#[derive(Default)]
pub struct TestWorld {
    tiles: HashMap<Position, Rc<TestTile>>,
    creatures: Vec<Rc<dyn MapCreature>>,
    missiles: Vec<Vec<Rc<dyn MapMissile>>>,
    static_texts: Vec<Rc<dyn MapText>>,
    animated_texts: Vec<Rc<dyn MapText>>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            missiles: vec![Vec::new(); FLOOR_COUNT],
            ..Self::default()
        }
    }

    pub fn insert(&mut self, tile: TestTile) -> Rc<TestTile> {
        for creature in &tile.creatures {
            self.creatures.push(creature.clone());
        }
        let tile = Rc::new(tile);
        self.tiles.insert(tile.position, tile.clone());
        tile
    }

    pub fn add_missile(&mut self, position: Position) {
        self.missiles[usize::from(position.z)].push(Rc::new(TestMissile { position }));
    }

    pub fn add_static_text(&mut self, position: Position, text: &str, visible: bool) {
        self.static_texts.push(Rc::new(TestText {
            position,
            text: text.to_string(),
            visible,
        }));
    }

    pub fn add_animated_text(&mut self, position: Position, text: &str) {
        self.animated_texts.push(Rc::new(TestText {
            position,
            text: text.to_string(),
            visible: true,
        }));
    }
}

impl MapStore for TestWorld {
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
            .cloned()
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    CameraMove(Point),
    PositionChange(Position, Option<Position>),
    FloorChange(u8, Option<u8>),
    FloorDrawingStart(u8),
    FloorDrawingEnd(u8),
}

#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub events: Rc<RefCell<Vec<ObserverEvent>>>,
}

impl RecordingObserver {
    pub fn take(&self) -> Vec<ObserverEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl MapViewObserver for RecordingObserver {
    fn on_camera_move(&mut self, offset: Point) {
        self.events.borrow_mut().push(ObserverEvent::CameraMove(offset));
    }

    fn on_position_change(&mut self, position: Position, previous: Option<Position>) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::PositionChange(position, previous));
    }

    fn on_floor_change(&mut self, floor: u8, previous: Option<u8>) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::FloorChange(floor, previous));
    }

    fn on_floor_drawing_start(&mut self, floor: u8) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::FloorDrawingStart(floor));
    }

    fn on_floor_drawing_end(&mut self, floor: u8) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::FloorDrawingEnd(floor));
    }
}
