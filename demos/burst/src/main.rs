// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fires bursts of projectiles from a pool registry and prints how the pools breathe.
//!
//! Usage: `burst [settings.json]`. Set `RUST_LOG=easypool=debug` to see fill and thinning.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use easypool::Compose;
use easypool::ManageObject;
use easypool::Poolable;
use easypool::PoolingSettings;
use easypool::Registry;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Particles emitted along a flight path.
#[derive(Default)]
struct Emitter {
    particles: Vec<(f32, f32)>,
    active: bool,
}

impl Poolable for Emitter {
    fn initialize(&mut self) {
        self.active = true;
    }

    fn recycle(&mut self) {
        self.active = false;
        self.particles.clear();
    }
}

#[derive(Default)]
struct Projectile {
    position: (f32, f32),
    emitter: Emitter,
}

impl Compose for Projectile {
    fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
        visit(&mut self.emitter);
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Kind {
    Bullet,
    Rocket,
}

impl ManageObject for Kind {
    type Object = Projectile;
    type Error = Infallible;

    fn create(&self) -> Result<Self::Object, Self::Error> {
        let capacity = match self {
            Kind::Bullet => 8,
            Kind::Rocket => 256,
        };
        Ok(Projectile {
            emitter: Emitter {
                particles: Vec::with_capacity(capacity),
                active: false,
            },
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => PoolingSettings::load_or_create(path)?,
        None => PoolingSettings::default()
            .with_thinning_check_interval(Duration::from_millis(500)),
    };
    info!(?settings, "starting");

    let registry = Arc::new(Registry::new(settings));
    let maintenance = easypool::maintenance::spawn(&registry, Duration::from_millis(16));

    registry.create_pool(&Kind::Bullet, Some(32), true)?;
    registry.create_pool(&Kind::Rocket, Some(4), false)?;

    for round in 0..3 {
        let mut flying = Vec::new();
        for i in 0..60 {
            let mut bullet = registry.acquire_for(&Kind::Bullet, None)?;
            bullet.position = (i as f32, 0.0);
            let position = bullet.position;
            bullet.emitter.particles.push(position);
            flying.push(bullet);
        }
        for _ in 0..6 {
            flying.push(registry.acquire_for(&Kind::Rocket, None)?);
        }
        report(&registry, &format!("burst {round}"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        for projectile in flying {
            registry.release(projectile);
        }
        report(&registry, &format!("landed {round}"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        report(&registry, &format!("settled {round}"));
    }

    registry.reset();
    drop(registry);
    maintenance.await?;
    Ok(())
}

fn report(registry: &Registry<Kind>, label: &str) {
    for (name, kind) in [("bullet", Kind::Bullet), ("rocket", Kind::Rocket)] {
        if let Some(pool) = registry.pool(&kind) {
            let status = pool.status();
            println!(
                "{label:>10} {name:>6}: target={} size={} idle={} in_use={} avg={}",
                status.target_count,
                status.current_size,
                status.idle_count,
                status.in_use,
                status.average_in_use,
            );
        }
    }
}
