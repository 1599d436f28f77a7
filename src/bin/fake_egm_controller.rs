//! Fake EGM controller - simulates an ABB robot controller over UDP.
//!
//! Streams `EgmRobot` feedback to an egm-bridge session and follows the
//! planned joints it sends back, so sessions can be exercised without
//! RobotStudio or a real arm.
//!
//! Usage:
//!   fake-egm-controller [options]
//!
//! Options:
//!   --bind <addr>        Local controller address (default: 127.0.0.1:6510)
//!   --target <addr>      Session address to stream to (default: 127.0.0.1:6511)
//!   --rate <hz>          Feedback rate (default: 250)
//!   --max-speed <deg/s>  Per-axis speed limit when following targets (default: 90)
//!   --duration <secs>    Stop after this many seconds (default: run forever)

use anyhow::{Context, Result};
use egm_bridge::protocol::{ControllerFeedback, MAX_DATAGRAM_SIZE, decode_planned, encode_feedback};
use egm_bridge::{CommunicationState, JOINT_COUNT, JointLimits, JointVector};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

struct Args {
    bind: SocketAddr,
    target: SocketAddr,
    rate_hz: u32,
    max_speed: f64,
    duration: Option<Duration>,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut result = Args {
        bind: SocketAddr::from(([127, 0, 0, 1], 6510)),
        target: SocketAddr::from(([127, 0, 0, 1], egm_bridge::transport::DEFAULT_EGM_PORT)),
        rate_hz: 250,
        max_speed: 90.0,
        duration: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" if i + 1 < args.len() => {
                result.bind = args[i + 1].parse().context("invalid --bind address")?;
                i += 2;
            }
            "--target" if i + 1 < args.len() => {
                result.target = args[i + 1].parse().context("invalid --target address")?;
                i += 2;
            }
            "--rate" if i + 1 < args.len() => {
                result.rate_hz = args[i + 1].parse().context("invalid --rate")?;
                i += 2;
            }
            "--max-speed" if i + 1 < args.len() => {
                result.max_speed = args[i + 1].parse().context("invalid --max-speed")?;
                i += 2;
            }
            "--duration" if i + 1 < args.len() => {
                let secs: f64 = args[i + 1].parse().context("invalid --duration")?;
                let duration =
                    Duration::try_from_secs_f64(secs).context("invalid --duration")?;
                result.duration = Some(duration);
                i += 2;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    anyhow::ensure!(result.rate_hz > 0, "--rate must be positive");
    Ok(result)
}

fn print_usage() {
    println!("Usage: fake-egm-controller [options]");
    println!();
    println!("Options:");
    println!("  --bind <addr>        Local controller address (default: 127.0.0.1:6510)");
    println!("  --target <addr>      Session address to stream to (default: 127.0.0.1:6511)");
    println!("  --rate <hz>          Feedback rate (default: 250)");
    println!("  --max-speed <deg/s>  Per-axis speed limit when following targets (default: 90)");
    println!("  --duration <secs>    Stop after this many seconds (default: run forever)");
}

/// Simulated arm: moves towards the last planned target at bounded speed.
struct SimulatedArm {
    joints: JointVector,
    target: Option<JointVector>,
    limits: JointLimits,
    max_speed: f64,
}

impl SimulatedArm {
    fn step(&mut self, dt: Duration) {
        let Some(target) = self.target else { return };
        let max_step = self.max_speed * dt.as_secs_f64();

        let mut next = *self.joints.as_array();
        for (i, slot) in next.iter_mut().enumerate() {
            let goal = target.as_array()[i];
            let delta = (goal - *slot).clamp(-max_step, max_step);
            *slot += delta;
        }
        self.joints = JointVector::new(next);
    }

    fn command(&mut self, planned: JointVector) {
        for i in 0..JOINT_COUNT {
            let angle = planned.as_array()[i];
            if !self.limits.contains(i, angle) {
                tracing::warn!(
                    axis = i + 1,
                    angle,
                    range = %self.limits.range_label(i),
                    "Planned angle outside axis range"
                );
            }
        }
        self.target = Some(planned);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("egm_bridge=info".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = parse_args()?;

    println!();
    println!("========================================");
    println!("Fake EGM Controller");
    println!("========================================");
    println!("Controller: {}", args.bind);
    println!("Session:    {}", args.target);
    println!("Rate:       {} Hz", args.rate_hz);
    println!("========================================");
    println!();

    let socket =
        UdpSocket::bind(args.bind).await.with_context(|| format!("binding {}", args.bind))?;
    let period = Duration::from_secs_f64(1.0 / args.rate_hz as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut arm = SimulatedArm {
        joints: JointVector::ZERO,
        target: None,
        limits: JointLimits::irb120(),
        max_speed: args.max_speed,
    };
    let started = Instant::now();
    let mut last_step = Instant::now();
    let mut sequence_number = 0u32;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        if args.duration.is_some_and(|limit| started.elapsed() >= limit) {
            tracing::info!("Duration reached after {} feedback messages", sequence_number);
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                arm.step(now - last_step);
                last_step = now;

                let state = if arm.target.is_some() {
                    CommunicationState::Running
                } else {
                    CommunicationState::Connected
                };
                let feedback = ControllerFeedback {
                    sequence_number,
                    timestamp: started.elapsed().as_millis() as u32,
                    joints: arm.joints,
                    state,
                };
                sequence_number = sequence_number.wrapping_add(1);

                if let Err(e) = socket.send_to(&encode_feedback(&feedback), args.target).await {
                    tracing::debug!("Feedback send failed: {}", e);
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port unreachable surfaces here while no session is listening
                        tracing::debug!("Receive failed: {}", e);
                        continue;
                    }
                };
                match decode_planned(&buf[..len]) {
                    Ok(planned) => {
                        tracing::trace!(
                            seqno = planned.header.sequence_number,
                            joints = %planned.planned_joints,
                            %from,
                            "Planned joints received"
                        );
                        arm.command(planned.planned_joints);
                    }
                    Err(e) => tracing::warn!("Ignoring datagram from {}: {}", from, e),
                }
            }
        }
    }

    Ok(())
}
