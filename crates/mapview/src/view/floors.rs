//! First/last visible floor resolution.
//!
//! Roofs and walls above the camera's 3x3 neighborhood hide the floors above them;
//! windows and doors (tiles the map reports as look-through) let diagonal neighbors count.

use crate::position::{
    Position, AWARE_UNDERGROUND_FLOOR_RANGE, MAX_Z, SEA_FLOOR, UNDERGROUND_FLOOR,
};
use crate::world::MapStore;

use super::MapView;

fn clamp_floor(z: i32) -> u8 {
    z.clamp(0, i32::from(MAX_Z)) as u8
}

pub fn first_visible_floor(
    map: &dyn MapStore,
    camera: Option<Position>,
    locked: Option<u8>,
    multifloor: bool,
) -> u8 {
    if let Some(lock) = locked {
        return clamp_floor(i32::from(lock));
    }
    let Some(camera) = camera.filter(|pos| pos.is_valid()) else {
        return SEA_FLOOR;
    };
    if !multifloor {
        return clamp_floor(i32::from(camera.z));
    }

    let mut first_floor = if camera.z > SEA_FLOOR {
        camera
            .z
            .saturating_sub(AWARE_UNDERGROUND_FLOOR_RANGE)
            .max(UNDERGROUND_FLOOR)
    } else {
        0
    };

    'neighbors: for ix in -1..=1 {
        for iy in -1..=1 {
            if first_floor >= camera.z {
                break 'neighbors;
            }
            let pos = camera.translated(ix, iy);
            let is_center = ix == 0 && iy == 0;
            let straight = ix.abs() != iy.abs();
            if !is_center && !(straight && map.is_look_possible(pos)) {
                continue;
            }

            let look_possible = map.is_look_possible(pos);
            let mut upper = pos;
            let mut covered = pos;
            while covered.covered_up(1) && upper.up(1) && upper.z >= first_floor {
                if map
                    .tile(upper)
                    .is_some_and(|tile| tile.limits_floors_view(!look_possible))
                {
                    first_floor = upper.z + 1;
                    break;
                }
                if map
                    .tile(covered)
                    .is_some_and(|tile| tile.limits_floors_view(look_possible))
                {
                    first_floor = covered.z + 1;
                    break;
                }
            }
        }
    }

    clamp_floor(i32::from(first_floor))
}

pub fn last_visible_floor(
    map: &dyn MapStore,
    camera: Option<Position>,
    locked: Option<u8>,
    multifloor: bool,
) -> u8 {
    if !multifloor {
        return first_visible_floor(map, camera, locked, multifloor);
    }

    let mut z = match camera.filter(|pos| pos.is_valid()) {
        Some(camera) if camera.z > SEA_FLOOR => {
            i32::from(camera.z) + i32::from(AWARE_UNDERGROUND_FLOOR_RANGE)
        }
        _ => i32::from(SEA_FLOOR),
    };
    if let Some(lock) = locked {
        z = z.max(i32::from(lock));
    }
    clamp_floor(z)
}

impl MapView {
    pub fn calc_first_visible_floor(&self, map: &dyn MapStore) -> u8 {
        first_visible_floor(
            map,
            self.camera_position(),
            self.locked_first_visible_floor,
            self.multifloor,
        )
    }

    pub fn calc_last_visible_floor(&self, map: &dyn MapStore) -> u8 {
        last_visible_floor(
            map,
            self.camera_position(),
            self.locked_first_visible_floor,
            self.multifloor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_world::{TestTile, TestWorld};

    const CAMERA: Position = Position::new(100, 100, 7);

    #[test]
    fn open_sky_shows_every_floor_from_zero() {
        let world = TestWorld::new();
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 0);
        assert_eq!(last_visible_floor(&world, Some(CAMERA), None, true), SEA_FLOOR);
    }

    #[test]
    fn roof_directly_above_limits_view() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(100, 100, 6)).limiting_view());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 7);
    }

    #[test]
    fn covering_tile_limits_view_two_floors_up() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(102, 102, 5)).limiting_view());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 6);
    }

    #[test]
    fn diagonal_neighbors_never_limit_view() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(99, 99, 6)).limiting_view());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 0);
    }

    #[test]
    fn straight_neighbor_blocked_for_look_only_counts_when_look_possible() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(101, 100, 5)).limiting_view());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 6);

        world.insert(TestTile::ground(Position::new(101, 100, 7)).blocking_look());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 0);
    }

    #[test]
    fn look_through_argument_differs_between_upper_and_covering_tiles() {
        let mut world = TestWorld::new();
        // Limits only when asked with is_free_view == false.
        world.insert(TestTile::ground(Position::new(100, 100, 6)).limiting_view_when_not_free());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 7);

        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(101, 101, 6)).limiting_view_when_not_free());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), None, true), 0);
    }

    #[test]
    fn underground_camera_sees_two_floors_each_way() {
        let world = TestWorld::new();
        let camera = Position::new(100, 100, 11);
        assert_eq!(first_visible_floor(&world, Some(camera), None, true), 9);
        assert_eq!(last_visible_floor(&world, Some(camera), None, true), 13);

        let deep = Position::new(100, 100, MAX_Z);
        assert_eq!(last_visible_floor(&world, Some(deep), None, true), MAX_Z);

        let shallow = Position::new(100, 100, 8);
        assert_eq!(first_visible_floor(&world, Some(shallow), None, true), UNDERGROUND_FLOOR);
    }

    #[test]
    fn single_floor_mode_pins_both_bounds_to_camera() {
        let world = TestWorld::new();
        for z in [0, 7, 12] {
            let camera = Position::new(100, 100, z);
            assert_eq!(first_visible_floor(&world, Some(camera), None, false), z);
            assert_eq!(last_visible_floor(&world, Some(camera), None, false), z);
        }
    }

    #[test]
    fn floor_lock_wins_and_is_clamped() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(100, 100, 6)).limiting_view());
        assert_eq!(first_visible_floor(&world, Some(CAMERA), Some(3), true), 3);
        assert_eq!(first_visible_floor(&world, Some(CAMERA), Some(200), true), MAX_Z);
        assert_eq!(last_visible_floor(&world, Some(CAMERA), Some(10), true), 10);
        assert_eq!(last_visible_floor(&world, Some(CAMERA), Some(200), true), MAX_Z);
    }

    #[test]
    fn unknown_camera_defaults_to_sea_floor() {
        let world = TestWorld::new();
        assert_eq!(first_visible_floor(&world, None, None, true), SEA_FLOOR);
        assert_eq!(last_visible_floor(&world, None, None, true), SEA_FLOOR);
    }

    #[test]
    fn bounds_stay_ordered_for_every_floor() {
        let mut world = TestWorld::new();
        world.insert(TestTile::ground(Position::new(100, 100, 4)).limiting_view());
        for z in 0..=MAX_Z {
            let camera = Position::new(100, 100, z);
            for multifloor in [true, false] {
                let first = first_visible_floor(&world, Some(camera), None, multifloor);
                let last = last_visible_floor(&world, Some(camera), None, multifloor);
                assert!(last <= MAX_Z);
                assert!(first <= last, "z={z} multifloor={multifloor}");
            }
        }
    }
}
