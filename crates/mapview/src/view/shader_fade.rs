use std::time::{Duration, Instant};

use crate::draw::ShaderId;
use crate::position::Position;

/// A shader bound to the map pass together with the camera position it was set at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveShader {
    pub id: ShaderId,
    pub anchor: Option<Position>,
}

/// Cross-fade between map shaders.
///
/// A fading-out shader always has a non-zero fade-out and a fading-in shader always exists
/// and has a non-zero fade-in; [`ShaderFade::set_shader`] picks `Stable` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderFade {
    Stable {
        shader: Option<ActiveShader>,
    },
    FadingOut {
        current: ActiveShader,
        next: Option<ActiveShader>,
        fade_in: Duration,
        fade_out: Duration,
        started_at: Instant,
    },
    FadingIn {
        shader: ActiveShader,
        fade_in: Duration,
        started_at: Instant,
    },
}

impl Default for ShaderFade {
    fn default() -> Self {
        ShaderFade::Stable { shader: None }
    }
}

impl ShaderFade {
    /// The shader bound this frame.
    pub fn active(&self) -> Option<&ActiveShader> {
        match self {
            ShaderFade::Stable { shader } => shader.as_ref(),
            ShaderFade::FadingOut { current, .. } => Some(current),
            ShaderFade::FadingIn { shader, .. } => Some(shader),
        }
    }

    pub fn pending(&self) -> Option<&ActiveShader> {
        match self {
            ShaderFade::FadingOut { next, .. } => next.as_ref(),
            _ => None,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, ShaderFade::Stable { .. })
    }

    /// Returns false when `next` is already the active shader.
    pub fn set_shader(
        &mut self,
        next: Option<ActiveShader>,
        fade_in: Duration,
        fade_out: Duration,
        now: Instant,
    ) -> bool {
        let current = self.active().cloned();
        if current.as_ref().map(|shader| &shader.id) == next.as_ref().map(|shader| &shader.id) {
            return false;
        }
        *self = match current {
            Some(current) if !fade_out.is_zero() => ShaderFade::FadingOut {
                current,
                next,
                fade_in,
                fade_out,
                started_at: now,
            },
            _ => Self::switched(next, fade_in, now),
        };
        true
    }

    /// Steps the fade to `now` and returns the map pass opacity for this frame.
    pub fn advance(&mut self, now: Instant) -> f32 {
        let (state, opacity) = match std::mem::take(self) {
            ShaderFade::Stable { shader } => (ShaderFade::Stable { shader }, 1.0),
            ShaderFade::FadingOut {
                current,
                next,
                fade_in,
                fade_out,
                started_at,
            } => {
                let elapsed = now.saturating_duration_since(started_at);
                if elapsed < fade_out {
                    let opacity = 1.0 - elapsed.as_secs_f32() / fade_out.as_secs_f32();
                    let state = ShaderFade::FadingOut {
                        current,
                        next,
                        fade_in,
                        fade_out,
                        started_at,
                    };
                    (state, opacity)
                } else {
                    (Self::switched(next, fade_in, now), 0.0)
                }
            }
            ShaderFade::FadingIn {
                shader,
                fade_in,
                started_at,
            } => {
                let elapsed = now.saturating_duration_since(started_at);
                let progress = elapsed.as_secs_f32() / fade_in.as_secs_f32();
                if progress >= 1.0 {
                    (ShaderFade::Stable { shader: Some(shader) }, 1.0)
                } else {
                    let state = ShaderFade::FadingIn {
                        shader,
                        fade_in,
                        started_at,
                    };
                    (state, progress)
                }
            }
        };
        *self = state;
        opacity
    }

    fn switched(shader: Option<ActiveShader>, fade_in: Duration, now: Instant) -> Self {
        match shader {
            Some(shader) if !fade_in.is_zero() => ShaderFade::FadingIn {
                shader,
                fade_in,
                started_at: now,
            },
            shader => ShaderFade::Stable { shader },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader(name: &str) -> Option<ActiveShader> {
        Some(ActiveShader {
            id: ShaderId(name.to_string()),
            anchor: None,
        })
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-3, "actual={actual} expected={expected}");
    }

    #[test]
    fn cross_fade_ramps_out_then_in() {
        let start = Instant::now();
        let mut fade = ShaderFade::Stable {
            shader: shader("map_default"),
        };
        assert!(fade.set_shader(
            shader("map_party"),
            Duration::from_millis(500),
            Duration::from_millis(300),
            start,
        ));

        assert_close(fade.advance(start), 1.0);
        assert_close(fade.advance(start + Duration::from_millis(150)), 0.5);
        assert_eq!(fade.active(), shader("map_default").as_ref());

        let swap = start + Duration::from_millis(300);
        assert_close(fade.advance(swap), 0.0);
        assert_eq!(fade.active(), shader("map_party").as_ref());

        assert_close(fade.advance(swap + Duration::from_millis(250)), 0.5);
        assert_close(fade.advance(swap + Duration::from_millis(600)), 1.0);
        assert!(fade.is_stable());
    }

    #[test]
    fn switch_without_fade_out_is_immediate() {
        let start = Instant::now();
        let mut fade = ShaderFade::Stable {
            shader: shader("map_default"),
        };
        fade.set_shader(shader("map_night"), Duration::ZERO, Duration::ZERO, start);
        assert_eq!(fade.active(), shader("map_night").as_ref());
        assert_close(fade.advance(start), 1.0);
    }

    #[test]
    fn first_shader_skips_fade_out_but_fades_in() {
        let start = Instant::now();
        let mut fade = ShaderFade::default();
        fade.set_shader(
            shader("map_default"),
            Duration::from_millis(200),
            Duration::from_millis(300),
            start,
        );
        assert!(matches!(fade, ShaderFade::FadingIn { .. }));
        assert_close(fade.advance(start + Duration::from_millis(100)), 0.5);
    }

    #[test]
    fn fading_out_to_nothing_ends_stable() {
        let start = Instant::now();
        let mut fade = ShaderFade::Stable {
            shader: shader("map_default"),
        };
        fade.set_shader(None, Duration::from_millis(500), Duration::from_millis(100), start);
        assert_close(fade.advance(start + Duration::from_millis(100)), 0.0);
        assert_eq!(fade, ShaderFade::Stable { shader: None });
        assert_close(fade.advance(start + Duration::from_millis(120)), 1.0);
    }

    #[test]
    fn setting_active_shader_again_is_ignored() {
        let start = Instant::now();
        let mut fade = ShaderFade::Stable {
            shader: shader("map_default"),
        };
        assert!(!fade.set_shader(
            shader("map_default"),
            Duration::ZERO,
            Duration::from_millis(300),
            start
        ));
        assert!(fade.is_stable());
    }
}
