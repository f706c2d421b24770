use rival_game::components::ObstacleType;
use rival_game::config::SimConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub session: SessionSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub level: LevelSection,
    #[serde(default)]
    pub sim: SimConfig,
}

#[derive(Debug, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    /// Stop after this many ticks. 0 = run until game over or Ctrl+C.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

fn default_tick_rate_hz() -> u32 {
    60
}

fn default_max_ticks() -> u64 {
    3_600
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            max_ticks: default_max_ticks(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    pub level: String,
}

/// Platform pattern repeated ahead of the camera.
#[derive(Debug, Deserialize)]
pub struct LevelSection {
    #[serde(default = "default_segments")]
    pub segments: Vec<SegmentConfig>,
    /// How far ahead of the camera platforms are kept laid out.
    #[serde(default = "default_lookahead")]
    pub lookahead: f32,
}

fn default_segments() -> Vec<SegmentConfig> {
    vec![
        SegmentConfig {
            length: 20.0,
            slope: 0.0,
            gap: 2.0,
            rise: 0.0,
            width: 6.0,
            obstacle: None,
        },
        SegmentConfig {
            length: 15.0,
            slope: 0.5,
            gap: 0.0,
            rise: 0.0,
            width: 6.0,
            obstacle: Some(ObstacleType::Low),
        },
        SegmentConfig {
            length: 25.0,
            slope: 0.0,
            gap: 3.0,
            rise: -1.0,
            width: 6.0,
            obstacle: Some(ObstacleType::High),
        },
    ]
}

fn default_lookahead() -> f32 {
    60.0
}

impl Default for LevelSection {
    fn default() -> Self {
        Self {
            segments: default_segments(),
            lookahead: default_lookahead(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    pub length: f32,
    #[serde(default)]
    pub slope: f32,
    /// Horizontal gap before this segment starts.
    #[serde(default)]
    pub gap: f32,
    /// Height change relative to where the previous segment ended.
    #[serde(default)]
    pub rise: f32,
    #[serde(default)]
    pub width: f32,
    /// Obstacle placed at the middle of the segment.
    #[serde(default)]
    pub obstacle: Option<ObstacleType>,
}

impl RunnerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
