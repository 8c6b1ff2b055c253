mod asset_keys;
pub mod config;
pub mod draw;
pub mod light;
pub mod position;
pub mod types;
pub mod view;
pub mod world;

#[cfg(test)]
mod test_world;

pub use asset_keys::{validate_asset_key, AssetKeyError};
pub use config::{ConfigError, MapViewConfig, ShaderConfig};
pub use draw::{
    DrawCommand, DrawPool, DrawPools, MapShaderUniforms, PoolKind, Primitive, ShaderBinding,
    ShaderId, TextureKey,
};
pub use light::{LightSource, LightView, Shade};
pub use position::{Direction, Position, FLOOR_COUNT, MAX_Z, SEA_FLOOR, UNDERGROUND_FLOOR};
pub use types::{AwareRange, Light, Point, Rect, Rgba, Size, COLOR_BLACK};
pub use view::{
    ActiveShader, DrawToggles, GeometryError, MapView, MapViewObserver, RectCache, RenderCaps,
    ShaderFade, ViewGeometry, ViewMode, VisibleTilesCache, TILE_PIXELS,
};
pub use world::{
    CreatureInfoContext, CreatureInfoFlags, GroundInfo, MapCreature, MapMissile, MapStore,
    MapText, MapTile,
};
