// 50 Hz loop with watchdog
// Note: a watchdog is a safety mechanism that triggers a safe action if something goes wrong
// Eg. without it if teleop crashes and stops sending commands, the chassis would keep driving

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

// local imports
use crate::assembly::{ActuatorFactory, FeetechFactory, SimFactory, build_chassis};
use crate::config::{CMD_TIMEOUT, LOOP_HZ, MOTOR_ENABLED, MOTOR_PORT, RobotConfig, TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_RT_STATE};
use crate::error::BuildError;
use crate::messages::{ChassisState, MotionCommand, RuntimeHealth};
use crate::motor::open_shared_bus;
use crate::swerve::Chassis;
use crate::tuning::TuningRegistry;

pub struct Runtime {
    latest_cmd: Option<MotionCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
    chassis: Chassis,
    tuning: TuningRegistry,
}

impl Runtime {
    /// Build the chassis described by `config` on the given actuators
    pub fn new(config: &RobotConfig, factory: &mut dyn ActuatorFactory) -> Result<Self, BuildError> {
        let mut tuning = TuningRegistry::new();
        let chassis = build_chassis(config, &mut tuning, factory)?;
        Ok(Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
            chassis,
            tuning,
        })
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: MotionCommand) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Pick the motion to apply this cycle based on watchdog state
    fn compute_motion(&mut self) -> MotionCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot and drop any remote tuning
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
                self.tuning.reset_all();
            }
            self.health = RuntimeHealth::CmdStale;
            MotionCommand::default() // Zero velocity
        } else if let Some(cmd) = self.latest_cmd {
            if self.health != RuntimeHealth::Ok {
                info!("Commands flowing, driving");
            }
            self.health = RuntimeHealth::Ok;
            cmd
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            MotionCommand::default()
        }
    }

    /// One control cycle: watchdog, strategy, actuators
    pub fn step(&mut self) -> ChassisState {
        let motion = self.compute_motion();
        self.chassis.set_motion(motion.direction(), motion.rotation);
        self.chassis.update();
        self.chassis.state()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn tuning(&self) -> &TuningRegistry {
        &self.tuning
    }

    pub fn tuning_mut(&mut self) -> &mut TuningRegistry {
        &mut self.tuning
    }
}

/// What `run` needs from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// JSON robot description; the built-in square base when absent
    pub config: Option<PathBuf>,
    /// Serial port override
    pub port: Option<String>,
    /// Use simulated actuators instead of the motor bus
    pub simulate: bool,
}

/// Loop timer; a late cycle is skipped instead of replayed in a burst
fn control_tick() -> Interval {
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match &options.config {
        Some(path) => RobotConfig::load(path)?,
        None => {
            info!("No config given, using the default square base");
            RobotConfig::default()
        }
    };

    let mut runtime = if options.simulate || !MOTOR_ENABLED {
        info!("Using simulated actuators");
        Runtime::new(&config, &mut SimFactory::new(&config))?
    } else {
        let port = options.port.as_deref().unwrap_or(MOTOR_PORT);
        let bus = open_shared_bus(port)?;
        Runtime::new(&config, &mut FeetechFactory::new(bus))?
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let pub_state = session.declare_publisher(TOPIC_RT_STATE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = control_tick();

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_BASE);
    info!("Publishing to: {}, {}", TOPIC_RT_STATE, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MotionCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Run the chassis (includes watchdog logic)
        let state = runtime.step();

        // 3. Publish chassis state
        let state_json = serde_json::to_string(&state)?;
        pub_state.put(state_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}
