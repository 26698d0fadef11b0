//! In-process multi-client simulation.
//!
//! Every user in the world gets a tracker client on its own task. Clients
//! talk only through one broadcast channel carrying JSON-encoded messages,
//! the same shape a real transport would carry. A wander task nudges the
//! non-reference tokens so the radar has something to find.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use mt_core::{
    AuthorityLevel, Clock, Effect, HeadlessSurface, MonotonicClock, RenderCache, RenderSurface,
    TrackerClient, TrackerMessage, TrackerSettings, Visibility, WindowState,
};
use mt_store::World;

use crate::host::LoggingAudio;

const BUS_CAPACITY: usize = 256;
const WANDER_INTERVAL: Duration = Duration::from_millis(250);
/// Time allowed for the final close to reach every client.
const SETTLE: Duration = Duration::from_millis(150);

pub struct SimulateOptions {
    pub scene: String,
    pub token: String,
    pub owner: String,
    pub seconds: f64,
    pub fps: u32,
    pub share: bool,
    pub seed: u64,
}

#[derive(Debug)]
enum Command {
    Open,
    Share,
    Close,
}

/// What one client saw over the run.
#[derive(Debug)]
pub struct ClientSummary {
    pub user: String,
    pub role: AuthorityLevel,
    pub window: WindowState,
    pub opens: usize,
    pub closes: usize,
    pub frames: u64,
    pub waves: usize,
    pub pings: usize,
    pub last_readout: String,
    pub presence: Vec<(String, Visibility)>,
}

struct SimClient {
    client: TrackerClient,
    surface: HeadlessSurface,
    audio: LoggingAudio,
    bus: broadcast::Sender<String>,
    opens: usize,
    closes: usize,
    frames: u64,
    last_readout: String,
}

impl SimClient {
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenWindow { .. } => {
                    self.surface = HeadlessSurface::new();
                    self.client.attach_device(&mut self.surface);
                    self.opens += 1;
                }
                Effect::ResizeWindow { .. } => {
                    self.client.attach_device(&mut self.surface);
                }
                Effect::CloseWindow => {
                    self.surface.clear();
                    self.closes += 1;
                }
                Effect::Publish(message) => match message.to_json() {
                    Ok(text) => {
                        // no receivers only happens during shutdown
                        let _ = self.bus.send(text);
                    }
                    Err(e) => tracing::warn!("failed to encode message: {e}"),
                },
            }
        }
    }

    fn summary(&self) -> ClientSummary {
        let wave_path = &self.client.settings().sounds.wave.path;
        let waves = self.audio.count(wave_path);
        ClientSummary {
            user: self.client.user_id().to_string(),
            role: self.client.authority(),
            window: self.client.window(),
            opens: self.opens,
            closes: self.closes,
            frames: self.frames,
            waves,
            pings: self.audio.total() - waves,
            last_readout: self.last_readout.clone(),
            presence: self
                .client
                .visibility_by_user()
                .iter()
                .map(|(u, v)| (u.clone(), *v))
                .collect(),
        }
    }
}

pub async fn run(
    world: World,
    settings: TrackerSettings,
    opts: SimulateOptions,
) -> Result<Vec<ClientSummary>> {
    let Some(scene) = mt_core::MapProvider::scene(&world, &opts.scene) else {
        bail!("scene '{}' not found", opts.scene);
    };
    if scene.token(&opts.token).is_none() {
        bail!("token '{}' not found in scene '{}'", opts.token, opts.scene);
    }
    if world.user(&opts.owner).is_none() {
        bail!("user '{}' not found", opts.owner);
    }
    if opts.fps == 0 {
        bail!("fps must be positive");
    }

    let roster = world.roster();
    let users: Vec<String> = world.users.iter().map(|u| u.id.clone()).collect();
    let controlled = world.controlled_tokens(&opts.owner).to_vec();
    let world = Arc::new(RwLock::new(world));
    let cache = Arc::new(RenderCache::new());
    let clock = MonotonicClock::new();
    let cancel = CancellationToken::new();
    let (bus, _) = broadcast::channel::<String>(BUS_CAPACITY);

    let mut handles = Vec::new();
    let mut owner_commands = None;
    for user in &users {
        let (tx, rx) = mpsc::channel(8);
        if *user == opts.owner {
            owner_commands = Some(tx);
        }
        let sim = SimClient {
            client: TrackerClient::new(user, roster.clone(), settings.clone(), Arc::clone(&cache)),
            surface: HeadlessSurface::new(),
            audio: LoggingAudio::new(),
            bus: bus.clone(),
            opens: 0,
            closes: 0,
            frames: 0,
            last_readout: String::new(),
        };
        let task = ClientTask {
            sim,
            inbox: bus.subscribe(),
            commands: rx,
            world: Arc::clone(&world),
            clock,
            scene: opts.scene.clone(),
            token: opts.token.clone(),
            controlled: controlled.clone(),
            frame: Duration::from_secs_f64(1.0 / f64::from(opts.fps)),
        };
        handles.push(tokio::spawn(task.run(cancel.clone())));
    }
    let commands = owner_commands.context("owner has no client")?;

    let wander = tokio::spawn(wander(
        Arc::clone(&world),
        opts.scene.clone(),
        opts.token.clone(),
        opts.seed,
        cancel.clone(),
    ));

    commands.send(Command::Open).await?;
    if opts.share {
        commands.send(Command::Share).await?;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f64(opts.seconds.max(0.0))) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, closing tracker"),
    }
    commands.send(Command::Close).await?;
    tokio::time::sleep(SETTLE).await;

    cancel.cancel();
    wander.await.context("wander task failed")?;
    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        summaries.push(handle.await.context("client task failed")?);
    }
    Ok(summaries)
}

struct ClientTask {
    sim: SimClient,
    inbox: broadcast::Receiver<String>,
    commands: mpsc::Receiver<Command>,
    world: Arc<RwLock<World>>,
    clock: MonotonicClock,
    scene: String,
    token: String,
    controlled: Vec<String>,
    frame: Duration,
}

impl ClientTask {
    async fn run(mut self, cancel: CancellationToken) -> ClientSummary {
        let mut ticker = tokio::time::interval(self.frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = self.frame.as_secs_f64();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(command) = self.commands.recv() => {
                    let client = &mut self.sim.client;
                    let effects = match command {
                        Command::Open => client.open(&self.scene, Some(&self.token), &self.controlled),
                        Command::Share => client.share(None),
                        Command::Close => client.close(),
                    };
                    self.sim.apply(effects);
                }
                result = self.inbox.recv() => match result {
                    Ok(text) => match TrackerMessage::from_json(&text) {
                        Ok(message) => {
                            let effects = self.sim.client.handle(&message);
                            self.sim.apply(effects);
                        }
                        Err(e) => tracing::warn!("dropping malformed message: {e}"),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("{} lagged, {n} messages dropped", self.sim.client.user_id());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => self.tick(dt),
            }
        }
        self.sim.summary()
    }

    fn tick(&mut self, dt: f64) {
        let Ok(world) = self.world.read() else {
            tracing::warn!("world lock poisoned");
            return;
        };
        let sim = &mut self.sim;
        if let Some(report) = sim.client.tick(
            dt,
            self.clock.now(),
            &*world,
            &mut sim.audio,
            &mut sim.surface,
        ) {
            sim.frames += 1;
            sim.last_readout = report.frame.readout.text;
        }
    }
}

/// Random-walk every token except the reference.
async fn wander(
    world: Arc<RwLock<World>>,
    scene_id: String,
    reference: String,
    seed: u64,
    cancel: CancellationToken,
) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut ticker = tokio::time::interval(WANDER_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Ok(mut world) = world.write() else {
                    tracing::warn!("world lock poisoned");
                    break;
                };
                let Some(scene) = world.scene_mut(&scene_id) else {
                    break;
                };
                let step = scene.grid.cell_size_px * 0.25;
                for token in scene.tokens.iter_mut().filter(|t| t.id != reference) {
                    token.x += rng.random_range(-step..=step);
                    token.y += rng.random_range(-step..=step);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: &str = r#"
[[users]]
id = "gm"
role = "gamemaster"

[[users]]
id = "ripley"
controls = ["marine"]

[[users]]
id = "hicks"

[[scenes]]
id = "deck"
grid = { cellSizePx = 100, distancePerCell = 5, unitLabel = "m" }

[[scenes.tokens]]
id = "marine"
x = 0
y = 0

[[scenes.tokens]]
id = "xeno"
x = 300
y = 400
"#;

    fn options(share: bool) -> SimulateOptions {
        SimulateOptions {
            scene: "deck".into(),
            token: "marine".into(),
            owner: "ripley".into(),
            seconds: 0.3,
            fps: 30,
            share,
            seed: 7,
        }
    }

    fn settings() -> TrackerSettings {
        TrackerSettings {
            gm_only: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_share_reaches_everyone_then_closes() {
        let world = World::from_toml_str(WORLD).unwrap();
        let summaries = run(world, settings(), options(true)).await.unwrap();

        assert_eq!(summaries.len(), 3);
        for s in &summaries {
            assert_eq!(s.opens, 1, "{} should have opened once", s.user);
            assert_eq!(s.window, WindowState::Closed);
            assert!(s.frames > 0);
        }
        let gm = summaries.iter().find(|s| s.user == "gm").unwrap();
        assert_eq!(gm.presence.len(), 3);
        assert!(gm.presence.iter().all(|(_, v)| *v == Visibility::Closed));
    }

    #[tokio::test]
    async fn test_without_share_only_gm_follows() {
        let world = World::from_toml_str(WORLD).unwrap();
        let summaries = run(world, settings(), options(false)).await.unwrap();
        let hicks = summaries.iter().find(|s| s.user == "hicks").unwrap();
        assert_eq!(hicks.opens, 0);
        let gm = summaries.iter().find(|s| s.user == "gm").unwrap();
        assert_eq!(gm.opens, 1);
    }

    #[tokio::test]
    async fn test_unknown_scene_is_an_error() {
        let world = World::from_toml_str(WORLD).unwrap();
        let mut opts = options(false);
        opts.scene = "hangar".into();
        assert!(run(world, settings(), opts).await.is_err());
    }
}
