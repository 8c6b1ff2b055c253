use std::rc::Rc;
use std::time::Instant;

use mapview::{
    ConfigError, Direction, DrawPools, MapCreature, MapStore, MapView, MapViewConfig, Point,
    Position, Rect, Size,
};
use tracing::{debug, info};

use super::demo_world::DemoWorld;

const PAN_STEP_PX: i32 = 8;
const ZOOM_STEP_TILES: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewerCommand {
    Step(Direction),
    ChangeFloor { up: bool },
    Zoom { zoom_in: bool },
    Pan { dx: i32, dy: i32 },
    ToggleFollow,
    ToggleLights,
    ToggleMultifloor,
    ToggleNames,
    ToggleHighlight,
    ToggleAntiAliasing,
}

/// The demo world plus the view looking at it, driven by viewer commands.
pub(crate) struct ViewerSession {
    view: MapView,
    world: DemoWorld,
    cursor: Option<Point>,
    viewport_size: Size,
}

impl ViewerSession {
    pub(crate) fn new(config: &MapViewConfig, now: Instant) -> Result<Self, ConfigError> {
        let world = DemoWorld::new();
        let mut view = MapView::with_config(config, now)?;
        view.set_world_aware_range(world.aware_range());
        view.on_global_light_change(world.global_light());
        let player: Rc<dyn MapCreature> = world.player();
        view.follow_creature(&player);

        Ok(Self {
            view,
            world,
            cursor: None,
            viewport_size: Size::default(),
        })
    }

    pub(crate) fn view(&self) -> &MapView {
        &self.view
    }

    pub(crate) fn apply(&mut self, command: ViewerCommand) {
        match command {
            ViewerCommand::Step(direction) => {
                if let Some((from, to)) = self.world.step_player(direction) {
                    self.on_player_moved(from, to);
                }
            }
            ViewerCommand::ChangeFloor { up } => {
                if let Some((from, to)) = self.world.change_player_floor(up) {
                    self.on_player_moved(from, to);
                }
            }
            ViewerCommand::Zoom { zoom_in } => {
                let step = if zoom_in {
                    -ZOOM_STEP_TILES
                } else {
                    ZOOM_STEP_TILES
                };
                let current = self.view.geometry().visible_dimension;
                let next = Size::new(current.width + step, current.height + step);
                if self.view.set_visible_dimension(next).is_ok() {
                    info!(width = next.width, height = next.height, "zoom_changed");
                }
            }
            ViewerCommand::Pan { dx, dy } => {
                if !self.view.is_following_creature() {
                    self.view.move_by(dx * PAN_STEP_PX, dy * PAN_STEP_PX);
                }
            }
            ViewerCommand::ToggleFollow => {
                if self.view.is_following_creature() {
                    if let Some(camera) = self.view.camera_position() {
                        self.view.set_camera_position(camera);
                    }
                } else {
                    let player: Rc<dyn MapCreature> = self.world.player();
                    self.view.follow_creature(&player);
                }
                info!(following = self.view.is_following_creature(), "camera_mode_changed");
            }
            ViewerCommand::ToggleLights => {
                self.view.set_draw_lights(!self.view.is_drawing_lights());
                info!(draw_lights = self.view.is_drawing_lights(), "lights_toggled");
            }
            ViewerCommand::ToggleMultifloor => {
                self.view.set_multifloor(!self.view.is_multifloor());
                info!(multifloor = self.view.is_multifloor(), "multifloor_toggled");
            }
            ViewerCommand::ToggleNames => {
                let mut toggles = self.view.draw_toggles();
                toggles.names = !toggles.names;
                self.view.set_draw_toggles(toggles);
            }
            ViewerCommand::ToggleHighlight => {
                let mut toggles = self.view.draw_toggles();
                toggles.highlight_target = !toggles.highlight_target;
                self.view.set_draw_toggles(toggles);
                self.update_mouse();
            }
            ViewerCommand::ToggleAntiAliasing => {
                self.view.set_anti_aliasing(!self.view.is_anti_aliasing());
            }
        }
    }

    fn on_player_moved(&mut self, from: Position, to: Position) {
        self.view.on_tile_update(from, true);
        self.view.on_tile_update(to, true);
        if self.view.is_following_creature() {
            self.view.on_camera_move(Point::default());
        }
        debug!(x = to.x, y = to.y, z = to.z, "player_moved");
    }

    pub(crate) fn set_cursor(&mut self, cursor: Option<Point>, viewport_size: Size) {
        self.cursor = cursor;
        self.viewport_size = viewport_size;
        self.update_mouse();
    }

    fn update_mouse(&mut self) {
        let position = self
            .cursor
            .and_then(|point| self.view.get_position(point, self.viewport_size));
        self.view.on_mouse_move(&self.world, position, false);
    }

    pub(crate) fn set_shift_pressed(&mut self, shift_pressed: bool) {
        self.view.on_key_release(&self.world, shift_pressed);
    }

    pub(crate) fn draw(&mut self, viewport_size: Size, now: Instant) -> &DrawPools {
        let rect = Rect::from_point_size(Point::default(), viewport_size);
        self.view.draw(&self.world, rect, now)
    }

    pub(crate) fn status_line(&self) -> String {
        match self.view.camera_position() {
            Some(camera) => {
                let cache = self.view.visible_tiles_cache();
                format!(
                    "{},{},{} | floors {}-{}",
                    camera.x,
                    camera.y,
                    camera.z,
                    cache.first_visible_floor(),
                    cache.last_visible_floor()
                )
            }
            None => "no camera".to_string(),
        }
    }
}
