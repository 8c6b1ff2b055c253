//! Draw pools emitted by the map view each frame.
//!
//! The view never touches a pixel buffer. Every pass records an ordered list of
//! [`DrawCommand`]s into its own [`DrawPool`]; a host rasterizes or uploads them.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect, Rgba, Size};

/// Identifies a shader program owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderId(pub String);

/// Identifies a texture owned by the host (an asset key, see [`crate::validate_asset_key`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureKey(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Map,
    CreatureInformation,
    Light,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    FilledRect {
        rect: Rect,
        color: Rgba,
    },
    TexturedRect {
        rect: Rect,
        texture: TextureKey,
    },
    Text {
        origin: Point,
        clip: Rect,
        text: String,
        color: Rgba,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub primitive: Primitive,
    pub opacity: f32,
}

/// Uniform values pushed to the active map shader.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapShaderUniforms {
    pub map_center_coord: [f32; 2],
    pub map_global_coord: [f32; 2],
    pub map_zoom: f32,
    pub map_walk_offset: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBinding {
    pub shader: ShaderId,
    pub uniforms: MapShaderUniforms,
}

#[derive(Debug, Clone)]
pub struct DrawPool {
    kind: PoolKind,
    buffer_size: Size,
    dest: Rect,
    src: Rect,
    opacity: f32,
    smooth: bool,
    shader: Option<ShaderBinding>,
    commands: Vec<DrawCommand>,
}

impl DrawPool {
    pub fn new(kind: PoolKind) -> Self {
        Self {
            kind,
            buffer_size: Size::default(),
            dest: Rect::default(),
            src: Rect::default(),
            opacity: 1.0,
            smooth: true,
            shader: None,
            commands: Vec::new(),
        }
    }

    /// Starts a new frame for this pool. Commands are cleared in place.
    pub fn begin(&mut self, dest: Rect, src: Rect) {
        self.dest = dest;
        self.src = src;
        self.opacity = 1.0;
        self.shader = None;
        self.commands.clear();
    }

    pub fn clear(&mut self) {
        self.begin(Rect::default(), Rect::default());
    }

    pub fn resize(&mut self, buffer_size: Size) {
        self.buffer_size = buffer_size;
    }

    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn set_shader(&mut self, binding: Option<ShaderBinding>) {
        self.shader = binding;
    }

    pub fn add_filled_rect(&mut self, rect: Rect, color: Rgba) {
        self.push(Primitive::FilledRect { rect, color });
    }

    pub fn add_textured_rect(&mut self, rect: Rect, texture: TextureKey) {
        self.push(Primitive::TexturedRect { rect, texture });
    }

    pub fn add_text(&mut self, origin: Point, clip: Rect, text: impl Into<String>, color: Rgba) {
        self.push(Primitive::Text {
            origin,
            clip,
            text: text.into(),
            color,
        });
    }

    /// Overrides the opacity of the most recently added command.
    pub fn set_last_opacity(&mut self, opacity: f32) {
        if let Some(last) = self.commands.last_mut() {
            last.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    fn push(&mut self, primitive: Primitive) {
        self.commands.push(DrawCommand {
            primitive,
            opacity: 1.0,
        });
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn buffer_size(&self) -> Size {
        self.buffer_size
    }

    pub fn dest(&self) -> Rect {
        self.dest
    }

    pub fn src(&self) -> Rect {
        self.src
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn smooth(&self) -> bool {
        self.smooth
    }

    pub fn shader(&self) -> Option<&ShaderBinding> {
        self.shader.as_ref()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The four passes of a frame, in presentation order.
#[derive(Debug, Clone)]
pub struct DrawPools {
    pub map: DrawPool,
    pub creature_information: DrawPool,
    pub light: DrawPool,
    pub text: DrawPool,
}

impl Default for DrawPools {
    fn default() -> Self {
        Self {
            map: DrawPool::new(PoolKind::Map),
            creature_information: DrawPool::new(PoolKind::CreatureInformation),
            light: DrawPool::new(PoolKind::Light),
            text: DrawPool::new(PoolKind::Text),
        }
    }
}

impl DrawPools {
    pub fn clear_all(&mut self) {
        self.map.clear();
        self.creature_information.clear();
        self.light.clear();
        self.text.clear();
    }

    pub fn in_order(&self) -> [&DrawPool; 4] {
        [
            &self.map,
            &self.creature_information,
            &self.light,
            &self.text,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_opacity_applies_only_to_newest_command() {
        let mut pool = DrawPool::new(PoolKind::Map);
        pool.add_filled_rect(Rect::new(0, 0, 10, 10), [1, 2, 3, 255]);
        pool.add_filled_rect(Rect::new(0, 0, 20, 20), [0, 0, 0, 255]);
        pool.set_last_opacity(0.4);

        let opacities: Vec<f32> = pool.commands().iter().map(|cmd| cmd.opacity).collect();
        assert_eq!(opacities, vec![1.0, 0.4]);
    }

    #[test]
    fn begin_resets_frame_state_but_keeps_buffer_config() {
        let mut pool = DrawPool::new(PoolKind::Map);
        pool.resize(Size::new(576, 448));
        pool.set_smooth(false);
        pool.set_opacity(0.2);
        pool.add_filled_rect(Rect::new(0, 0, 1, 1), [0, 0, 0, 255]);

        pool.begin(Rect::new(0, 0, 100, 100), Rect::new(32, 32, 50, 50));

        assert!(pool.is_empty());
        assert_eq!(pool.opacity(), 1.0);
        assert_eq!(pool.buffer_size(), Size::new(576, 448));
        assert!(!pool.smooth());
        assert_eq!(pool.src(), Rect::new(32, 32, 50, 50));
    }
}
