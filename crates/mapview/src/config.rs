//! JSON configuration for a [`MapView`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::asset_keys::{validate_asset_key, AssetKeyError};
use crate::draw::ShaderId;
use crate::types::Size;
use crate::view::{
    validate_visible_dimension, DrawToggles, GeometryError, MapView, RenderCaps, ViewGeometry,
    DEFAULT_RENDER_SCALE, DEFAULT_VISIBLE_DIMENSION,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read map view config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse map view config {origin} at {field}: {source}")]
    Parse {
        origin: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("invalid {field} `{key}`: {source}")]
    AssetKey {
        field: &'static str,
        key: String,
        #[source]
        source: AssetKeyError,
    },
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    pub name: String,
    #[serde(default)]
    pub fade_in_secs: f32,
    #[serde(default)]
    pub fade_out_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapViewConfig {
    pub visible_dimension: Size,
    pub render_scale: u8,
    pub auto_view_mode: bool,
    /// Ignored while `auto_view_mode` is on.
    pub multifloor: bool,
    pub anti_aliasing: bool,
    pub draw_lights: bool,
    pub floor_lock: Option<u8>,
    pub shader: Option<ShaderConfig>,
    pub crosshair_texture: Option<String>,
    pub draw: DrawToggles,
    pub shadow_floor_intensity: f32,
    pub minimum_ambient_light: f32,
    pub caps: RenderCaps,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            visible_dimension: DEFAULT_VISIBLE_DIMENSION,
            render_scale: DEFAULT_RENDER_SCALE,
            auto_view_mode: false,
            multifloor: true,
            anti_aliasing: true,
            draw_lights: false,
            floor_lock: None,
            shader: None,
            crosshair_texture: None,
            draw: DrawToggles::default(),
            shadow_floor_intensity: 0.0,
            minimum_ambient_light: 0.0,
            caps: RenderCaps::default(),
        }
    }
}

impl MapViewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw, &path.display().to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses without validating; call [`MapViewConfig::validate`] before use.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, "inline json")
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Self>(&mut deserializer).map_err(|error| {
            let field = error.path().to_string();
            ConfigError::Parse {
                origin: origin.to_string(),
                field,
                source: error.into_inner(),
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_visible_dimension(self.visible_dimension)?;
        ViewGeometry::compute(
            self.visible_dimension,
            Size::default(),
            self.render_scale,
            self.caps.max_texture_size,
        )?;

        check_unit_range("shadow_floor_intensity", self.shadow_floor_intensity)?;
        check_unit_range("minimum_ambient_light", self.minimum_ambient_light)?;

        if let Some(shader) = &self.shader {
            check_asset_key("shader.name", &shader.name)?;
            check_fade("shader.fade_in_secs", shader.fade_in_secs)?;
            check_fade("shader.fade_out_secs", shader.fade_out_secs)?;
        }
        if let Some(crosshair) = self.crosshair_texture.as_deref().filter(|key| !key.is_empty()) {
            check_asset_key("crosshair_texture", crosshair)?;
        }
        Ok(())
    }
}

fn check_unit_range(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

const MAX_FADE_SECS: f32 = 60.0;

fn check_fade(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=MAX_FADE_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: MAX_FADE_SECS,
        })
    }
}

fn check_asset_key(field: &'static str, key: &str) -> Result<(), ConfigError> {
    validate_asset_key(key).map_err(|source| ConfigError::AssetKey {
        field,
        key: key.to_string(),
        source,
    })
}

impl MapView {
    /// Builds a view from a validated copy of `config`; `now` anchors the initial shader fade.
    pub fn with_config(config: &MapViewConfig, now: Instant) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut view = MapView::new(config.caps);
        view.set_geometry(config.visible_dimension, config.render_scale)?;
        view.set_auto_view_mode(config.auto_view_mode);
        view.set_multifloor(config.multifloor);
        view.set_anti_aliasing(config.anti_aliasing);
        view.set_draw_lights(config.draw_lights);
        view.set_draw_toggles(config.draw);
        view.set_shadow_floor_intensity(config.shadow_floor_intensity);
        view.set_minimum_ambient_light(config.minimum_ambient_light);
        if let Some(floor) = config.floor_lock {
            view.lock_first_visible_floor(floor);
        }
        if let Some(crosshair) = &config.crosshair_texture {
            view.set_crosshair_texture(crosshair)
                .map_err(|source| ConfigError::AssetKey {
                    field: "crosshair_texture",
                    key: crosshair.clone(),
                    source,
                })?;
        }
        if let Some(shader) = &config.shader {
            view.set_shader(
                Some(ShaderId(shader.name.clone())),
                Duration::from_secs_f32(shader.fade_in_secs),
                Duration::from_secs_f32(shader.fade_out_secs),
                now,
            );
        }

        info!(
            visible_width = config.visible_dimension.width,
            visible_height = config.visible_dimension.height,
            render_scale = config.render_scale,
            draw_lights = config.draw_lights,
            floor_lock = ?config.floor_lock,
            "map_view_configured"
        );
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::view::ViewMode;

    #[test]
    fn default_config_is_valid_and_matches_default_view() {
        let config = MapViewConfig::default();
        config.validate().expect("default config is valid");

        let view = MapView::with_config(&config, Instant::now()).expect("view builds");
        assert_eq!(*view.geometry(), *MapView::default().geometry());
        assert!(view.is_anti_aliasing());
        assert!(!view.is_drawing_lights());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = MapViewConfig::from_json_str(
            r#"{ "visible_dimension": { "width": 21, "height": 15 }, "draw_lights": true }"#,
        )
        .expect("config parses");
        assert_eq!(config.visible_dimension, Size::new(21, 15));
        assert!(config.draw_lights);
        assert_eq!(config.render_scale, 100);
        assert_eq!(config.caps.max_texture_size, 4096);
    }

    #[test]
    fn parse_errors_name_the_offending_field() {
        let error = MapViewConfig::from_json_str(r#"{ "shader": { "name": 5 } }"#)
            .expect_err("name must be a string");
        match error {
            ConfigError::Parse { field, .. } => assert_eq!(field, "shader.name"),
            other => panic!("unexpected error: {other}"),
        }

        let error = MapViewConfig::from_json_str(r#"{ "render_scale": 400 }"#)
            .expect_err("render scale is a u8");
        assert!(matches!(error, ConfigError::Parse { ref field, .. } if field == "render_scale"));
    }

    #[test]
    fn maximal_width_is_rejected_as_too_large() {
        let config = MapViewConfig::from_json_str(
            r#"{ "visible_dimension": { "width": 2147483647, "height": 11 } }"#,
        )
        .expect("config parses");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Geometry(GeometryError::SurfaceTooLarge { .. }))
        ));
        assert!(MapView::with_config(&config, Instant::now()).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(MapViewConfig::from_json_str(r#"{ "zoom": 3 }"#).is_err());
    }

    #[test]
    fn validation_rejects_bad_geometry_and_keys() {
        let even = MapViewConfig {
            visible_dimension: Size::new(16, 11),
            ..MapViewConfig::default()
        };
        assert!(matches!(
            even.validate(),
            Err(ConfigError::Geometry(GeometryError::EvenVisibleDimension { .. }))
        ));

        let huge = MapViewConfig {
            visible_dimension: Size::new(301, 11),
            ..MapViewConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::Geometry(GeometryError::SurfaceTooLarge { .. }))
        ));

        let crosshair = MapViewConfig {
            crosshair_texture: Some("ui/Crosshair.png".to_string()),
            ..MapViewConfig::default()
        };
        assert!(matches!(
            crosshair.validate(),
            Err(ConfigError::AssetKey {
                field: "crosshair_texture",
                ..
            })
        ));

        let shadow = MapViewConfig {
            shadow_floor_intensity: 1.5,
            ..MapViewConfig::default()
        };
        assert!(matches!(
            shadow.validate(),
            Err(ConfigError::OutOfRange {
                field: "shadow_floor_intensity",
                ..
            })
        ));

        let fade = MapViewConfig {
            shader: Some(ShaderConfig {
                name: "map_default".to_string(),
                fade_in_secs: -1.0,
                fade_out_secs: 0.0,
            }),
            ..MapViewConfig::default()
        };
        assert!(fade.validate().is_err());
    }

    #[test]
    fn with_config_applies_every_setting() {
        let config = MapViewConfig {
            visible_dimension: Size::new(11, 9),
            render_scale: 50,
            auto_view_mode: true,
            anti_aliasing: false,
            draw_lights: true,
            floor_lock: Some(4),
            shader: Some(ShaderConfig {
                name: "map_default".to_string(),
                fade_in_secs: 0.0,
                fade_out_secs: 0.0,
            }),
            crosshair_texture: Some("ui/crosshair".to_string()),
            minimum_ambient_light: 0.2,
            ..MapViewConfig::default()
        };
        let view = MapView::with_config(&config, Instant::now()).expect("view builds");

        assert_eq!(view.geometry().visible_dimension, Size::new(11, 9));
        assert_eq!(view.geometry().tile_size, 16);
        assert_eq!(view.view_mode(), ViewMode::Mid);
        assert!(!view.is_anti_aliasing());
        assert!(view.is_drawing_lights());
        assert_eq!(view.locked_first_visible_floor(), Some(4));
        assert_eq!(
            view.shader_fade().active().map(|shader| shader.id.0.as_str()),
            Some("map_default")
        );
        assert!(view.crosshair_texture().is_some());
    }

    #[test]
    fn load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "visible_dimension": {{ "width": 17, "height": 13 }}, "floor_lock": 6 }}"#
        )
        .expect("write config");
        let config = MapViewConfig::load(file.path()).expect("config loads");
        assert_eq!(config.visible_dimension, Size::new(17, 13));
        assert_eq!(config.floor_lock, Some(6));

        let mut invalid = tempfile::NamedTempFile::new().expect("temp file");
        write!(invalid, r#"{{ "visible_dimension": {{ "width": 2, "height": 2 }} }}"#)
            .expect("write config");
        assert!(matches!(
            MapViewConfig::load(invalid.path()),
            Err(ConfigError::Geometry(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing.json");
        match MapViewConfig::load(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
