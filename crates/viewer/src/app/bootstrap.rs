use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mapview::{ConfigError, MapViewConfig, RenderCaps, Size};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) const MAPVIEW_CONFIG_ENV_VAR: &str = "MAPVIEW_CONFIG";
pub(crate) const ASSET_ROOT_ENV_VAR: &str = "MAPVIEW_ASSET_ROOT";

#[derive(Debug, Clone)]
pub(crate) struct ViewerConfig {
    pub(crate) window_title: String,
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) max_render_fps: Option<u32>,
    pub(crate) metrics_log_interval: Duration,
    pub(crate) asset_root: PathBuf,
    pub(crate) map_view_config_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_title: "Map Viewer".to_string(),
            window_width: 960,
            window_height: 704,
            max_render_fps: Some(60),
            metrics_log_interval: Duration::from_secs(1),
            asset_root: PathBuf::from("assets"),
            map_view_config_path: None,
        }
    }
}

pub(crate) fn build_app() -> ViewerConfig {
    init_tracing();
    info!("=== Map Viewer Startup ===");

    let defaults = ViewerConfig::default();
    ViewerConfig {
        asset_root: env_path(ASSET_ROOT_ENV_VAR).unwrap_or(defaults.asset_root.clone()),
        map_view_config_path: env_path(MAPVIEW_CONFIG_ENV_VAR),
        ..defaults
    }
}

/// Loads the configured map view settings, or the demo defaults when no file is named.
pub(crate) fn load_map_view_config(path: Option<&Path>) -> Result<MapViewConfig, ConfigError> {
    match path {
        Some(path) => {
            let config = MapViewConfig::load(path)?;
            info!(path = %path.display(), "map_view_config_loaded");
            Ok(config)
        }
        None => Ok(demo_map_view_config()),
    }
}

/// The software rasterizer has no shader stage, so shaders are reported unsupported.
fn demo_map_view_config() -> MapViewConfig {
    MapViewConfig {
        visible_dimension: Size::new(15, 11),
        draw_lights: true,
        shadow_floor_intensity: 0.3,
        minimum_ambient_light: 0.25,
        caps: RenderCaps {
            shaders_supported: false,
            ..RenderCaps::default()
        },
        ..MapViewConfig::default()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn env_path(var: &'static str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(value) if value.trim().is_empty() => None,
        Ok(value) => Some(PathBuf::from(value.trim())),
        Err(env::VarError::NotPresent) => None,
        Err(error) => {
            warn!(env_var = var, error = %error, "unable to read env var; ignoring it");
            None
        }
    }
}
