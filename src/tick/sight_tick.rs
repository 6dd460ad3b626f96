/// 視線查詢的 ECS 整合
///
/// 每次分派先推進 epoch，再處理本 tick 排入的視線請求。
/// 快照由組件打包，引擎不直接讀取組件
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use specs::prelude::*;
use specs::Component;
use vek::Vec3;

use crate::sight::{QueryPreset, SightEngine, SightReason, TargetSnapshot, Visibility};

/// 腳底位置
#[derive(Component, Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[storage(VecStorage)]
pub struct SightPos(pub Vec3<f32>);

/// 參與視線判定的單位
#[derive(Component, Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[storage(VecStorage)]
pub struct SightBody {
    pub team: i32,
    pub alive: bool,
    pub forward: Vec3<f32>,
}

impl Default for SightBody {
    fn default() -> Self {
        Self {
            team: 0,
            alive: true,
            forward: Vec3::unit_x(),
        }
    }
}

/// 最近一次推進到的 epoch
#[derive(Default, Debug, Clone, Copy)]
pub struct SightEpoch(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SightRequest {
    pub observer: Entity,
    pub subject: Entity,
    pub preset: QueryPreset,
}

/// 本 tick 待處理的請求
#[derive(Default, Debug)]
pub struct SightRequests(pub Vec<SightRequest>);

/// 本 tick 的查詢結果
#[derive(Default, Debug)]
pub struct SightResults(pub HashMap<SightRequest, Visibility>);

impl SightResults {
    pub fn get(&self, observer: Entity, subject: Entity, preset: QueryPreset) -> Option<Visibility> {
        self.0.get(&SightRequest { observer, subject, preset }).copied()
    }
}

/// 由實體編號與世代組成的穩定識別碼，存活實體的世代至少為 1，所以不會是 0
pub fn identity_of(entity: Entity) -> u64 {
    (u64::from(entity.gen().id() as u32) << 32) | u64::from(entity.id())
}

pub fn snapshot_of(entity: Entity, pos: &SightPos, body: &SightBody, is_self: bool) -> TargetSnapshot {
    TargetSnapshot {
        position: pos.0,
        forward: body.forward,
        team: body.team,
        alive: body.alive,
        is_self,
        identity: identity_of(entity),
    }
}

/// 每次分派推進一次 epoch
pub struct SightEpochSystem;

impl<'a> System<'a> for SightEpochSystem {
    type SystemData = (Write<'a, SightEpoch>, WriteExpect<'a, SightEngine>);

    fn run(&mut self, (mut epoch, mut engine): Self::SystemData) {
        epoch.0 += 1;
        engine.advance_epoch(epoch.0);
    }
}

/// 處理排入的視線請求
pub struct SightQuerySystem;

impl<'a> System<'a> for SightQuerySystem {
    type SystemData = (
        ReadStorage<'a, SightPos>,
        ReadStorage<'a, SightBody>,
        WriteExpect<'a, SightEngine>,
        Write<'a, SightRequests>,
        Write<'a, SightResults>,
    );

    fn run(&mut self, (positions, bodies, mut engine, mut requests, mut results): Self::SystemData) {
        results.0.clear();
        for request in requests.0.drain(..) {
            let observer = positions.get(request.observer).zip(bodies.get(request.observer));
            let subject = positions.get(request.subject).zip(bodies.get(request.subject));
            let visibility = match (observer, subject) {
                (Some((op, ob)), Some((sp, sb))) => {
                    let o = snapshot_of(request.observer, op, ob, true);
                    let s = snapshot_of(request.subject, sp, sb, request.subject == request.observer);
                    engine.visible_preset(&o, &s, request.preset)
                }
                _ => {
                    log::debug!(
                        "sight request {:?} -> {:?} missing components",
                        request.observer,
                        request.subject
                    );
                    Visibility::blocked(SightReason::Blocked)
                }
            };
            results.0.insert(request, visibility);
        }
    }
}

/// 註冊組件與資源
pub fn setup_sight_world(world: &mut World, engine: SightEngine) {
    world.register::<SightPos>();
    world.register::<SightBody>();
    world.insert(engine);
    world.insert(SightEpoch::default());
    world.insert(SightRequests::default());
    world.insert(SightResults::default());
}

/// epoch 系統一定在查詢系統之前
pub fn sight_dispatcher<'a, 'b>() -> Dispatcher<'a, 'b> {
    DispatcherBuilder::new()
        .with(SightEpochSystem, "sight_epoch", &[])
        .with(SightQuerySystem, "sight_query", &["sight_epoch"])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sight::BoxWorld;

    fn world_with_wall() -> World {
        let mut engine = SightEngine::default();
        engine.register_filtered(
            BoxWorld::new().with_wall(Vec3::new(200.0, -50.0, 0.0), Vec3::new(220.0, 50.0, 200.0)),
        );
        let mut world = World::new();
        setup_sight_world(&mut world, engine);
        world
    }

    fn spawn(world: &mut World, at: Vec3<f32>, team: i32) -> Entity {
        world
            .create_entity()
            .with(SightPos(at))
            .with(SightBody { team, ..Default::default() })
            .build()
    }

    #[test]
    fn identity_is_never_zero() {
        let mut world = World::new();
        world.register::<SightPos>();
        let e = world.create_entity().with(SightPos::default()).build();
        assert_eq!(e.id(), 0);
        assert_ne!(identity_of(e), 0);
    }

    #[test]
    fn dispatch_answers_requests_and_advances_epoch() {
        let mut world = world_with_wall();
        let hero = spawn(&mut world, Vec3::zero(), 1);
        let open = spawn(&mut world, Vec3::new(0.0, 300.0, 0.0), 2);
        let hidden = spawn(&mut world, Vec3::new(500.0, 0.0, 0.0), 2);
        {
            let mut requests = world.write_resource::<SightRequests>();
            requests.0.push(SightRequest { observer: hero, subject: open, preset: QueryPreset::Hard });
            requests.0.push(SightRequest { observer: hero, subject: hidden, preset: QueryPreset::Hard });
        }
        let mut dispatcher = sight_dispatcher();
        dispatcher.dispatch(&world);
        world.maintain();

        let results = world.read_resource::<SightResults>();
        assert_eq!(results.get(hero, open, QueryPreset::Hard), Some(Visibility::VISIBLE));
        assert_eq!(
            results.get(hero, hidden, QueryPreset::Hard).map(|v| v.reason),
            Some(SightReason::Blocked)
        );
        assert_eq!(world.read_resource::<SightEpoch>().0, 1);
        assert_eq!(world.read_resource::<SightEngine>().epoch(), 1);
        assert!(world.read_resource::<SightRequests>().0.is_empty());
    }

    #[test]
    fn dead_component_reports_dead() {
        let mut world = world_with_wall();
        let hero = spawn(&mut world, Vec3::zero(), 1);
        let corpse = world
            .create_entity()
            .with(SightPos(Vec3::new(0.0, 300.0, 0.0)))
            .with(SightBody { team: 2, alive: false, ..Default::default() })
            .build();
        world.write_resource::<SightRequests>().0.push(SightRequest {
            observer: hero,
            subject: corpse,
            preset: QueryPreset::Default,
        });
        sight_dispatcher().dispatch(&world);
        let results = world.read_resource::<SightResults>();
        assert_eq!(
            results.get(hero, corpse, QueryPreset::Default).map(|v| v.into_tuple()),
            Some((false, "dead"))
        );
    }
}
