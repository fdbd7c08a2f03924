//
// Copyright (c) The Rewind Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rewind_events::codec::TraceContext;
use rewind_events::input::InputEvent;
use rewind_events::trace::{self, TraceWriter};
use rewind_events::Event;
use rewind_replay::error::Error;
use rewind_replay::replayer::{Observation, Replayer, ReplayerConfig};
use rewind_replay::{InvariantRegistry, Simulation};
use rewind_topology::ConnectivityTracker;
use rewind_utils::ids::{Dpid, PortNo};
use rewind_utils::label::LabelAllocator;
use rewind_utils::task::Task;
use tracing::{info, warn};

use crate::collab::Detached;
use crate::config::Config;
use crate::topogen;

// ===== global functions =====

// Replay mode: load the trace and drive it to completion.
pub(crate) async fn replay(config: &Config) -> Result<(), String> {
    let mut sim = build_simulation(config)?;
    let trace_path = trace_path(config, &config.replay.trace_file);
    let events = load_trace(&trace_path, &sim)?;
    info!(trace = %trace_path.display(), count = %events.len(),
        "trace loaded");

    let mut replayer = Replayer::new(events, replayer_config(config));
    let _sigint = sigint_task(&replayer);

    let delay = Duration::from_secs_f64(config.replay.delay);
    loop {
        match replayer.step(&mut sim).await {
            Ok(true) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Ok(false) => break,
            Err(Error::Interrupted(reason)) => {
                warn!(?reason, "dropping to interactive shell");
                return shell(config, replayer, sim).await;
            }
            Err(error) => return Err(error.to_string()),
        }
    }

    print_report(&replayer, &sim);
    Ok(())
}

// Fuzz mode: generate a random-but-reproducible input trace through
// the same codec the replayer consumes.
pub(crate) async fn fuzz(config: &Config) -> Result<(), String> {
    let topology = topogen::generate(&config.topology_generator)
        .map_err(|error| error.to_string())?;
    let output = trace_path(config, &config.fuzz.output_file);
    let mut writer =
        TraceWriter::create(&output).map_err(|error| error.to_string())?;
    let mut labels = LabelAllocator::new();
    let mut rng = StdRng::seed_from_u64(config.fuzz.seed);

    let mut append = |event: &mut Event, round: i64| -> Result<(), String> {
        event.logical_round = round;
        writer.append(event).map_err(|error| error.to_string())
    };

    let mut round = 0;
    let mut event =
        Event::input(&mut labels, InputEvent::ConnectToControllers);
    append(&mut event, round)?;

    let switches: Vec<_> =
        topology.switches().map(|switch| switch.dpid).collect();
    let mut crashed: Vec<Dpid> = vec![];
    let mut severed: Vec<(Dpid, PortNo, Dpid, PortNo)> = vec![];
    let trunks: Vec<_> = topology
        .links()
        .filter_map(|link| {
            let src_port = link.src.port_no?;
            let dst_port = link.dst.port_no?;
            let src = topology
                .switches()
                .find(|switch| switch.name == link.src.node.as_str())?;
            let dst = topology
                .switches()
                .find(|switch| switch.name == link.dst.node.as_str())?;
            Some((src.dpid, src_port, dst.dpid, dst_port))
        })
        .collect();

    for step in 0..config.fuzz.steps {
        round += 1;
        if config.fuzz.check_interval != 0
            && step % config.fuzz.check_interval == 0
        {
            let mut event =
                Event::input(&mut labels, InputEvent::CheckInvariants {
                    invariant_name: config.fuzz.invariant_check.clone(),
                });
            append(&mut event, round)?;
            continue;
        }

        let roll: f64 = rng.random();
        let input = if roll < config.fuzz.switch_failure_rate {
            match crashed.pop() {
                Some(dpid) => InputEvent::SwitchRecovery { dpid },
                None => {
                    let dpid =
                        switches[rng.random_range(0..switches.len())];
                    crashed.push(dpid);
                    InputEvent::SwitchFailure { dpid }
                }
            }
        } else if roll < config.fuzz.switch_failure_rate
            + config.fuzz.link_failure_rate
            && !trunks.is_empty()
        {
            match severed.pop() {
                Some((start_dpid, start_port_no, end_dpid, end_port_no)) => {
                    InputEvent::LinkRecovery {
                        start_dpid,
                        start_port_no,
                        end_dpid,
                        end_port_no,
                    }
                }
                None => {
                    let (start_dpid, start_port_no, end_dpid, end_port_no) =
                        trunks[rng.random_range(0..trunks.len())];
                    severed.push((
                        start_dpid,
                        start_port_no,
                        end_dpid,
                        end_port_no,
                    ));
                    InputEvent::LinkFailure {
                        start_dpid,
                        start_port_no,
                        end_dpid,
                        end_port_no,
                    }
                }
            }
        } else {
            InputEvent::NopInput
        };
        let mut event = Event::input(&mut labels, input);
        append(&mut event, round)?;
    }

    info!(trace = %output.display(), steps = %config.fuzz.steps,
        seed = %config.fuzz.seed, "fuzz trace written");
    Ok(())
}

// Interactive mode: load the trace but hand control to the shell.
pub(crate) async fn interactive(config: &Config) -> Result<(), String> {
    let mut sim = build_simulation(config)?;
    let trace_path = trace_path(config, &config.replay.trace_file);
    let events = load_trace(&trace_path, &sim)?;
    let replayer = Replayer::new(events, replayer_config(config));
    let _sigint = sigint_task(&replayer);
    shell(config, replayer, sim).await?;
    Ok(())
}

// ===== helper functions =====

fn build_simulation(config: &Config) -> Result<Simulation, String> {
    let topology = topogen::generate(&config.topology_generator)
        .map_err(|error| error.to_string())?;
    let mut sim = Simulation::new(
        topology,
        ConnectivityTracker::new(config.default_connected),
        InvariantRegistry::new(),
        Box::new(Detached),
        Box::new(Detached),
        Box::new(Detached),
    );

    // Register the sync channel of every configured controller. In
    // detached mode the replies only get logged.
    for controller in &config.controllers {
        info!(id = %controller.id, host = %controller.host,
            port = %controller.port, booted = %config.boot_controllers,
            "controller configured");
        let (reply_tx, mut reply_rx) = tokio::sync::mpsc::unbounded_channel();
        sim.sync
            .register_controller(controller.id.as_str().into(), reply_tx);
        let controller_id = controller.id.clone();
        let mut task = Task::spawn(async move {
            while let Some(value) = reply_rx.recv().await {
                info!(controller_id = %controller_id, %value,
                    "deterministic value delivered");
            }
        });
        task.detach();
    }

    Ok(sim)
}

fn load_trace(
    path: &Path,
    sim: &Simulation,
) -> Result<Vec<Event>, String> {
    let mut labels = LabelAllocator::new();
    let mut ctx = TraceContext {
        labels: &mut labels,
        invariants: &sim.invariants,
    };
    trace::load_trace(path, &mut ctx).map_err(|error| {
        error.log();
        error.to_string()
    })
}

fn trace_path(config: &Config, file: &str) -> PathBuf {
    Path::new(&config.trace_dir).join(file)
}

fn replayer_config(config: &Config) -> ReplayerConfig {
    ReplayerConfig {
        default_timeout: Duration::from_secs_f64(
            config.replay.default_timeout,
        ),
        pass_through_sends: config.replay.pass_through_sends,
        ignore_whitelisted_packets: config
            .replay
            .ignore_whitelisted_packets,
        fail_to_interactive: config.replay.fail_to_interactive,
        fail_to_interactive_on_persistent_violations: config
            .replay
            .fail_to_interactive_on_persistent_violations,
        ..Default::default()
    }
}

// Routes SIGINT into the replayer as an interrupt observation so the
// in-flight event state survives.
fn sigint_task(replayer: &Replayer) -> Task<()> {
    let observations = replayer.observation_channel();
    Task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = observations.send(Observation::Interrupt);
        }
    })
}

fn print_report(replayer: &Replayer, sim: &Simulation) {
    let report = replayer.report(sim);
    println!(
        "replay finished at {} after {} rounds",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.rounds
    );
    if !report.timed_out.is_empty() {
        println!("timed out events: {:?}", report.timed_out);
    }
    if !report.failed.is_empty() {
        println!("failed events: {:?}", report.failed);
    }
    if report.violations.is_empty() {
        println!("no correctness violations");
    } else {
        for (round, violations) in &report.violations {
            for violation in violations {
                println!("round {round}: violation: {violation}");
            }
        }
    }
}

// Minimal human-driven shell over the replayer.
async fn shell(
    _config: &Config,
    mut replayer: Replayer,
    mut sim: Simulation,
) -> Result<(), String> {
    println!("interactive shell: step | run | check <name> | report | quit");
    loop {
        let Some(line) = read_command().await else {
            break;
        };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("step"), _) => match replayer.step(&mut sim).await {
                Ok(true) => {
                    if let Some(event) = replayer.current_event() {
                        println!("next event: {event}");
                    }
                }
                Ok(false) => println!("trace exhausted"),
                Err(error) => println!("interrupted: {error}"),
            },
            (Some("run"), _) => match replayer.run(&mut sim).await {
                Ok(..) => println!("trace exhausted"),
                Err(error) => println!("interrupted: {error}"),
            },
            (Some("check"), Some(name)) => {
                match sim.invariants.get(name) {
                    Some(check) => {
                        let violations = check(&sim);
                        if violations.is_empty() {
                            println!("no correctness violations");
                        } else {
                            for violation in violations {
                                println!("violation: {violation}");
                            }
                        }
                    }
                    None => println!("unknown invariant check: {name}"),
                }
            }
            (Some("report"), _) => print_report(&replayer, &sim),
            (Some("quit"), _) | (Some("exit"), _) => break,
            (Some(command), _) => println!("unknown command: {command}"),
            (None, _) => (),
        }
    }
    print_report(&replayer, &sim);
    Ok(())
}

async fn read_command() -> Option<String> {
    Task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(..) => None,
            Ok(..) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}
