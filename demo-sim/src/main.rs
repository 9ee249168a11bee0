mod link;
mod world;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use runtime::{
    Authority, Channel, LocalId, Observer, PeerId, ReceiveOutcome, ReplicationHooks, RuntimeConfig,
    Tick, TickReport,
};
use schema::{Schema, Value};
use serde::Serialize;

use crate::link::LossyLink;
use crate::world::{demo_schema, launch, Ship, SHIP_HULL, SHIP_THROTTLE};

#[derive(Parser)]
#[command(
    name = "demo-sim",
    version,
    about = "Replicates a small fleet to several observers over a lossy link"
)]
struct Cli {
    /// Number of observers; each pilots one ship.
    #[arg(long, default_value_t = 4)]
    peers: u32,
    /// Ships flown by the authority.
    #[arg(long, default_value_t = 4)]
    drones: u32,
    /// Ticks to simulate with loss enabled.
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    /// Loss-free ticks appended before the convergence check.
    #[arg(long, default_value_t = 10)]
    settle: u32,
    /// Probability that a tick-state message is dropped.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,
    /// Probability that an ack is dropped.
    #[arg(long, default_value_t = 0.1)]
    ack_loss: f64,
    /// Probability that an input message is dropped.
    #[arg(long, default_value_t = 0.1)]
    input_loss: f64,
    /// RNG seed for deterministic runs.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Tick at which the first observer stops acknowledging.
    #[arg(long)]
    silence_at: Option<u32>,
    /// Runtime config as JSON; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the run summary here instead of stdout.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let schema = demo_schema()?;

    let summary = run(&cli, &schema, config)?;
    let contents = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    match &cli.summary {
        Some(path) => fs::write(path, contents).with_context(|| format!("write {}", path.display()))?,
        None => println!("{contents}"),
    }
    if !summary.converged {
        bail!("{} observers diverged from the authority", summary.diverged.len());
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: RuntimeConfig =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    config.validate().context("invalid runtime config")?;
    Ok(config)
}

/// Event counts collected from one observer's hooks.
#[derive(Debug, Default, Serialize)]
struct Counters {
    placeholders: u64,
    updates: u64,
    hull_changes: u64,
    mispredictions: u64,
    releases: u64,
}

impl ReplicationHooks for Counters {
    fn on_placeholder(&mut self, _local: LocalId, _type_id: u16) {
        self.placeholders += 1;
    }

    fn on_entity_updated(&mut self, _local: LocalId, _mask: u64) {
        self.updates += 1;
    }

    fn on_property_changed(&mut self, _local: LocalId, index: u8, _value: &Value) {
        if index == SHIP_HULL {
            self.hull_changes += 1;
        }
    }

    fn on_mispredicted(&mut self, local: LocalId, mask: u64, tick: Tick) {
        debug!("{local} mispredicted {mask:#b} at {tick}");
        self.mispredictions += 1;
    }

    fn on_released(&mut self, _local: LocalId) {
        self.releases += 1;
    }
}

struct Viewer {
    id: PeerId,
    observer: Observer,
    hooks: Counters,
    applied: u64,
    aborted: u64,
}

#[derive(Debug, Serialize)]
struct ViewerSummary {
    peer: u32,
    applied: u64,
    aborted: u64,
    entities: usize,
    #[serde(flatten)]
    hooks: Counters,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    seed: u64,
    ticks: u32,
    messages: u64,
    dropped: u64,
    bytes: u64,
    max_message_bytes: usize,
    oversized: u64,
    inputs_applied: u64,
    timed_out: Vec<u32>,
    despawned: usize,
    viewers: Vec<ViewerSummary>,
    diverged: Vec<u32>,
    converged: bool,
}

fn run(cli: &Cli, schema: &Arc<Schema>, config: RuntimeConfig) -> Result<Summary> {
    let mut rng = fastrand::Rng::with_seed(cli.seed);
    #[allow(clippy::cast_precision_loss)]
    let dt = 1.0 / config.tick_rate as f32;
    let mut auth = Authority::new(Arc::clone(schema), config.clone())?;
    let mut summary = Summary {
        seed: cli.seed,
        ..Summary::default()
    };

    let mut link = LossyLink::new(cli.seed.wrapping_add(1), cli.loss);
    let mut viewers = Vec::new();
    let mut ships: Vec<Ship> = Vec::new();
    for n in 0..cli.peers {
        let id = PeerId(n + 1);
        auth.add_peer(id)?;
        link.connect(id);
        // Odd peers only see cargo.
        if n % 2 == 1 {
            auth.set_interest(id, 0b01)?;
        }
        viewers.push(Viewer {
            id,
            observer: Observer::new(Arc::clone(schema), config.clone())?,
            hooks: Counters::default(),
            applied: 0,
            aborted: 0,
        });
        ships.push(launch(&mut auth, Some(id), n, &mut rng)?);
    }
    for n in 0..cli.drones {
        ships.push(launch(&mut auth, None, cli.peers + n, &mut rng)?);
    }
    info!("{} peers, {} ships, {} ticks", cli.peers, ships.len(), cli.ticks);

    let silent = viewers.first().map(|v| v.id);
    for step in 1..=cli.ticks + cli.settle {
        let lossy = step <= cli.ticks;
        let tick = Tick::new(step);
        link.set_loss(if lossy { cli.loss } else { 0.0 });

        for viewer in &mut viewers {
            if let Some(bytes) = steer(viewer, tick, &mut rng)? {
                if lossy && rng.f64() < cli.input_loss {
                    continue;
                }
                match auth.receive_input(viewer.id, &bytes) {
                    Ok(n) => summary.inputs_applied += n as u64,
                    Err(err) => warn!("input from peer {} rejected: {err}", viewer.id),
                }
            }
        }
        for ship in &mut ships {
            ship.fly(&mut auth, dt, &mut rng)?;
        }

        let report = auth.tick();
        record(&mut summary, &report);
        for peer in &report.timed_out {
            link.disconnect(*peer);
        }
        if !report.timed_out.is_empty() {
            viewers.retain(|v| !report.timed_out.contains(&v.id));
            ships.retain(|s| !report.disposed.contains(&s.id));
        }
        report.dispatch(&mut link)?;

        for viewer in &mut viewers {
            let muted = cli.silence_at.is_some_and(|at| step >= at) && Some(viewer.id) == silent;
            let drop_ack = muted || (lossy && rng.f64() < cli.ack_loss);
            if let Some(ack) = deliver(viewer, link.drain(viewer.id), report.tick)? {
                if !drop_ack {
                    auth.acknowledge(viewer.id, &ack)?;
                }
            }
        }
    }

    summary.ticks = cli.ticks + cli.settle;
    summary.dropped = link.dropped;
    for viewer in &viewers {
        if !converged(&auth, viewer) {
            warn!("peer {} diverged from the authority", viewer.id);
            summary.diverged.push(viewer.id.0);
        }
    }
    summary.converged = summary.diverged.is_empty();
    summary.viewers = viewers
        .into_iter()
        .map(|v| ViewerSummary {
            peer: v.id.0,
            applied: v.applied,
            aborted: v.aborted,
            entities: v.observer.entities().count(),
            hooks: v.hooks,
        })
        .collect();
    Ok(summary)
}

/// Pilots nudge their throttle now and then and send the change as input.
fn steer(viewer: &mut Viewer, tick: Tick, rng: &mut fastrand::Rng) -> Result<Option<Vec<u8>>> {
    let owned: Vec<LocalId> = viewer
        .observer
        .entities()
        .filter(|(_, e)| e.is_owned())
        .map(|(local, _)| local)
        .collect();
    for local in owned {
        if rng.u8(..) < 32 {
            viewer
                .observer
                .set_local(local, SHIP_THROTTLE, Value::F32(rng.f32()))?;
        }
    }
    viewer.observer.store_predicted(tick)?;
    Ok(viewer.observer.build_input(tick)?)
}

/// Applies what the link delivered this tick. Release notices arrive ahead
/// of tick state. Returns the ack for the newest applied tick.
fn deliver(viewer: &mut Viewer, inbox: Vec<(Channel, Vec<u8>)>, tick: Tick) -> Result<Option<Vec<u8>>> {
    let mut ack = None;
    for (channel, bytes) in inbox {
        match channel {
            Channel::Spawn => {
                viewer.observer.receive_release(&bytes, &mut viewer.hooks)?;
            }
            Channel::TickState => match viewer.observer.receive(&bytes, &mut viewer.hooks) {
                Ok(ReceiveOutcome::Applied { ack: bytes, .. }) => {
                    viewer.applied += 1;
                    ack = Some(bytes);
                }
                Ok(ReceiveOutcome::Stale { .. }) => {}
                Err(err) => {
                    warn!("peer {} could not apply {tick}: {err}", viewer.id);
                    viewer.aborted += 1;
                }
            },
            other => debug!("peer {} ignored {other:?} message", viewer.id),
        }
    }
    Ok(ack)
}

fn record(summary: &mut Summary, report: &TickReport) {
    for out in &report.outgoing {
        summary.messages += 1;
        summary.bytes += out.bytes.len() as u64;
        summary.max_message_bytes = summary.max_message_bytes.max(out.bytes.len());
    }
    summary.oversized += report.oversized as u64;
    summary.timed_out.extend(report.timed_out.iter().map(|p| p.0));
    summary.despawned += report.disposed.len();
}

/// Every visible property the observer confirmed matches the authority.
fn converged(auth: &Authority, viewer: &Viewer) -> bool {
    let Some(peer) = auth.peer(viewer.id) else {
        return false;
    };
    let schema = auth.schema();
    peer.entities().entities().all(|(entity, local)| {
        let (Ok(record), Some(remote)) = (auth.arena().get(entity), viewer.observer.entity(local)) else {
            return false;
        };
        let Some(ty) = schema.entity_type(record.type_id()) else {
            return false;
        };
        let visible = peer.visible_mask(entity, ty);
        ty.properties
            .iter()
            .zip(record.values().iter().zip(remote.confirmed()))
            .filter(|(def, _)| visible & def.bit() != 0)
            .all(|(_, (expected, actual))| close(expected, actual))
    })
}

fn close(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Pose(a), Value::Pose(b)) => {
            a.position.distance_sq(b.position) <= 0.01
                && a.rotation.normalize().angle_to(b.rotation).to_degrees() <= 1.0
        }
        _ => expected == actual,
    }
}
