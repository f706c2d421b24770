mod autopilot;
mod config;
mod level_feed;

use std::time::Duration;

use autopilot::Autopilot;
use config::RunnerConfig;
use glam::Vec3;
use level_feed::LevelFeed;
use rival_game::game_world::{CombatEventKind, GameEvent, GameWorld};
use rival_game::progression;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Where the first platform segment starts.
const LEVEL_START: Vec3 = Vec3::new(-10.0, 0.0, 0.0);

/// Totals printed as JSON when the session ends.
#[derive(Debug, Default, Serialize)]
struct SessionSummary {
    ticks: u64,
    score: u64,
    level: u32,
    /// Fraction of the way to the next level.
    level_progress: f32,
    distance: f32,
    defeated: u32,
    pickups: u32,
    damage_taken: f32,
    abilities_used: u32,
    level_ups: u32,
    game_over: bool,
}

impl SessionSummary {
    fn record(&mut self, event: &GameEvent, player: u64) {
        match event {
            GameEvent::Defeated { by: Some(by), .. } if *by == player => self.defeated += 1,
            GameEvent::Combat(c) if c.kind == CombatEventKind::Item => self.pickups += 1,
            GameEvent::Combat(c) if c.kind == CombatEventKind::Damage && c.target == player => {
                self.damage_taken += c.value;
            }
            GameEvent::AbilityUsed { caster, .. } if *caster == player => self.abilities_used += 1,
            GameEvent::LevelUp { id, .. } if *id == player => self.level_ups += 1,
            _ => {}
        }
    }

    /// Copy the final session state out of the world.
    fn finish(&mut self, gw: &GameWorld, player: u64) {
        self.ticks = gw.current_tick();
        self.score = gw.score();
        if let Some(level) = gw.level(player) {
            self.level = level.current;
            self.level_progress = progression::xp_progress(&level);
        } else {
            self.level = 1;
        }
        self.distance = gw.position(player).map(|p| p.x).unwrap_or_default();
        self.game_over = gw.is_game_over();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "runner.toml".into());
    let config = match RunnerConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "Rival runner v{} starting (seed {}, {} Hz, max ticks {})",
        env!("CARGO_PKG_VERSION"),
        config.sim.seed,
        config.session.tick_rate_hz,
        config.session.max_ticks
    );

    let mut gw = GameWorld::new(config.sim.clone());
    let abilities: Vec<&str> = gw.abilities().all().iter().map(|a| a.id.as_str()).collect();
    info!("Abilities loaded: {}", abilities.join(", "));
    let mut feed = LevelFeed::new(config.level.segments.clone(), config.level.lookahead, LEVEL_START);
    if let Err(e) = feed.fill(&mut gw, 0.0) {
        error!("Invalid level pattern: {e}");
        std::process::exit(1);
    }
    let player = gw.spawn_player(Vec3::new(0.0, 1.0, 0.0));
    let mut pilot = Autopilot::new(player);
    let mut summary = SessionSummary::default();

    let tick_rate = config.session.tick_rate_hz.max(1);
    let period = Duration::from_secs_f64(1.0 / f64::from(tick_rate));
    let dt = period.as_secs_f32();
    let mut tick_interval = tokio::time::interval(period);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                if let Err(e) = pilot.drive(&mut gw) {
                    warn!("Autopilot stopped: {e}");
                    break;
                }
                gw.tick(dt);

                let camera_x = gw.camera_x();
                if let Err(e) = feed.fill(&mut gw, camera_x) {
                    error!("Level feed failed: {e}");
                    break;
                }
                for event in gw.drain_events() {
                    debug!("{:?}", event);
                    summary.record(&event, player);
                }

                if gw.is_game_over() {
                    info!("Game over at tick {}", gw.current_tick());
                    break;
                }
                let max_ticks = config.session.max_ticks;
                if max_ticks > 0 && gw.current_tick() >= max_ticks {
                    info!("Reached tick limit {}", max_ticks);
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    summary.finish(&gw, player);

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize session summary: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rival_game::game_world::CombatEvent;

    #[test]
    fn summary_counts_player_events_only() {
        let mut summary = SessionSummary::default();
        let events = [
            GameEvent::Defeated { id: 5, by: Some(1) },
            GameEvent::Defeated { id: 6, by: None },
            GameEvent::Combat(CombatEvent::damage(1, 12.0, false)),
            GameEvent::Combat(CombatEvent::damage(5, 30.0, true)),
            GameEvent::LevelUp { id: 1, level: 2 },
            GameEvent::AbilityUsed {
                caster: 1,
                target: 5,
                ability: "logic_spike".into(),
            },
        ];
        for event in &events {
            summary.record(event, 1);
        }
        assert_eq!(summary.defeated, 1);
        assert!((summary.damage_taken - 12.0).abs() < 0.01);
        assert_eq!(summary.level_ups, 1);
        assert_eq!(summary.abilities_used, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["defeated"], 1);
    }

    #[test]
    fn short_session_runs_headless() {
        let config: RunnerConfig = toml::from_str(
            r#"
            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        let mut gw = GameWorld::new(config.sim.clone());
        let mut feed = LevelFeed::new(config.level.segments.clone(), config.level.lookahead, LEVEL_START);
        feed.fill(&mut gw, 0.0).unwrap();
        let player = gw.spawn_player(Vec3::new(0.0, 1.0, 0.0));
        let mut pilot = Autopilot::new(player);

        for _ in 0..120 {
            if gw.is_game_over() {
                break;
            }
            pilot.drive(&mut gw).unwrap();
            gw.tick(1.0 / 60.0);
            let camera_x = gw.camera_x();
            feed.fill(&mut gw, camera_x).unwrap();
        }
        assert!(gw.current_tick() > 0);
        assert!(feed.end_x() > gw.camera_x());
    }

    #[test]
    fn summary_reports_level_progress() {
        let mut gw = GameWorld::new(rival_game::config::SimConfig::default());
        let player = gw.spawn_player(Vec3::new(0.0, 50.0, 0.0));
        gw.award_xp(player, 50).unwrap();

        let mut summary = SessionSummary::default();
        summary.finish(&gw, player);
        assert_eq!(summary.level, 1);
        assert!((summary.level_progress - 0.5).abs() < 0.01);
        assert!(!summary.game_over);
    }
}
