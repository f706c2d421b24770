//! Lays the configured platform pattern out ahead of the camera.

use glam::Vec3;
use rival_game::components::PlatformData;
use rival_game::error::SimError;
use rival_game::game_world::GameWorld;
use rival_game::physics::{self, PlatformShape};
use tracing::{trace, warn};

use crate::config::SegmentConfig;

pub struct LevelFeed {
    segments: Vec<SegmentConfig>,
    lookahead: f32,
    /// Where the last laid segment ended.
    cursor: Vec3,
    next: usize,
}

impl LevelFeed {
    pub fn new(segments: Vec<SegmentConfig>, lookahead: f32, start: Vec3) -> Self {
        Self {
            segments,
            lookahead,
            cursor: start,
            next: 0,
        }
    }

    /// x where the laid-out level currently ends.
    pub fn end_x(&self) -> f32 {
        self.cursor.x
    }

    /// Spawn segments until the level reaches `lookahead` past `camera_x`.
    /// Returns how many platforms were spawned.
    pub fn fill(&mut self, gw: &mut GameWorld, camera_x: f32) -> Result<usize, SimError> {
        let mut spawned = 0;
        while self.cursor.x < camera_x + self.lookahead {
            let Some(segment) = self.segments.get(self.next % self.segments.len().max(1)).cloned() else {
                warn!("Level pattern is empty, nothing to lay out");
                break;
            };
            self.next += 1;

            let origin = self.cursor + Vec3::new(segment.gap, segment.rise, 0.0);
            let data = PlatformData {
                length: segment.length,
                slope: segment.slope,
                width: segment.width,
            };
            gw.spawn_platform(origin, data)?;
            spawned += 1;

            let angle = segment.slope * physics::SLOPE_TO_RADIANS;
            let span = segment.length * angle.cos();
            let end = origin + Vec3::new(span, span * angle.tan(), 0.0);

            if let Some(kind) = segment.obstacle {
                let mid_x = origin.x + span / 2.0;
                let shape = PlatformShape { origin, data };
                let ground = physics::platform_ground_height(&shape, Vec3::new(mid_x, 0.0, origin.z))
                    .unwrap_or(origin.y);
                gw.spawn_obstacle(Vec3::new(mid_x, ground, origin.z), kind);
            }

            if end.x <= self.cursor.x {
                warn!("Segment {:?} does not advance the level, stopping", segment);
                break;
            }
            self.cursor = end;
        }
        if spawned > 0 {
            trace!("Laid {} platforms, level now ends at x {}", spawned, self.cursor.x);
        }
        Ok(spawned)
    }
}
