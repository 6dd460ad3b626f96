use failure::{err_msg, Error};
use log::{info, warn};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;
use std::time::{Duration, Instant};
use vek::Vec3;

use omb_sight::tick::sight_tick::*;
use omb_sight::{BodyBox, BoxWorld, QueryPreset, SightEngine, SightSettings};
use specs::prelude::*;

const TPS: u64 = 10;
const DEMO_TICKS: u64 = 30;

/// 固定頻率的 tick 時鐘
struct Clock {
    target: Duration,
    last: Instant,
    dt: Duration,
}

impl Clock {
    fn new(target: Duration) -> Self {
        Self {
            target,
            last: Instant::now(),
            dt: target,
        }
    }

    fn dt(&self) -> Duration {
        self.dt
    }

    fn tick(&mut self) {
        let elapsed = self.last.elapsed();
        if elapsed < self.target {
            spin_sleep::sleep(self.target - elapsed);
        }
        let now = Instant::now();
        self.dt = now - self.last;
        self.last = now;
    }
}

fn init_logging() -> Result<(), Error> {
    if Path::new("log4rs.yml").exists() {
        log4rs::init_file("log4rs.yml", Default::default()).map_err(|e| err_msg(e.to_string()))?;
        return Ok(());
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {h({l})} {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(log::LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn load_settings() -> SightSettings {
    for path in ["sight.toml", "sight.yaml"] {
        if !Path::new(path).exists() {
            continue;
        }
        match SightSettings::load_from_file(path) {
            Ok(settings) => {
                info!("載入視線設定: {}", path);
                return settings;
            }
            Err(e) => warn!("無法讀取視線設定 {}: {}，使用預設值", path, e),
        }
    }
    SightSettings::default()
}

fn main() -> std::result::Result<(), Error> {
    init_logging()?;

    let mut engine = SightEngine::new(load_settings());
    let mut world = World::new();

    // 中路一段牆與一隻小兵
    let geometry = BoxWorld::new()
        .with_wall(Vec3::new(400.0, -100.0, 0.0), Vec3::new(440.0, 100.0, 120.0))
        .with_body(BodyBox::standing(0, 2, false, Vec3::new(200.0, 300.0, 0.0), 16.0, 72.0));
    engine.register_filtered(geometry);
    setup_sight_world(&mut world, engine);

    let hero = world
        .create_entity()
        .with(SightPos(Vec3::zero()))
        .with(SightBody { team: 1, ..Default::default() })
        .build();
    let enemy = world
        .create_entity()
        .with(SightPos(Vec3::new(800.0, 0.0, 0.0)))
        .with(SightBody { team: 2, ..Default::default() })
        .build();
    let flanker = world
        .create_entity()
        .with(SightPos(Vec3::new(400.0, 300.0, 0.0)))
        .with(SightBody { team: 2, ..Default::default() })
        .build();

    let mut dispatcher = sight_dispatcher();
    let mut clock = Clock::new(Duration::from_secs_f64(1.0 / TPS as f64));
    for tick in 0..DEMO_TICKS {
        {
            // 敵方英雄沿 y 軸移動，逐漸繞出牆後
            let mut positions = world.write_storage::<SightPos>();
            if let Some(pos) = positions.get_mut(enemy) {
                pos.0.y = tick as f32 * 10.0;
            }
        }
        {
            let mut requests = world.write_resource::<SightRequests>();
            for subject in [enemy, flanker] {
                for preset in [QueryPreset::Default, QueryPreset::Hard, QueryPreset::WorldOnlyHard] {
                    requests.0.push(SightRequest { observer: hero, subject, preset });
                }
            }
        }
        dispatcher.dispatch(&world);
        world.maintain();

        {
            let results = world.read_resource::<SightResults>();
            if let Some(v) = results.get(hero, enemy, QueryPreset::Hard) {
                info!("tick {} enemy visible: {} {}", tick, v.visible, v.reason);
            }
        }
        clock.tick();
        log::trace!("tick dt {:?}", clock.dt());
    }

    let engine = world.read_resource::<SightEngine>();
    info!("sight engine state\n{}", engine.debug_dump());
    println!("{}", serde_json::to_string_pretty(&engine.metrics_snapshot())?);
    Ok(())
}
