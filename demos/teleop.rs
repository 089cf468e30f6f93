// Drive the swerve base from a terminal.
//
// Held keys set a body velocity that is republished every cycle and falls
// back to zero once key repeats stop arriving.
//
//   W/S  forward/back     A/D  left/right     Z/X  rotate
//   1-3  speed level      Space stop          Q/Esc quit
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::{Duration, Instant};
use swerve_zenoh_runtime::config::{LOOP_HZ, TOPIC_CMD_BASE};
use swerve_zenoh_runtime::messages::MotionCommand;
use tracing::info;

// Key repeat gaps longer than this count as a release
const RELEASE_AFTER: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy)]
struct SpeedLevel {
    label: &'static str,
    linear: f64,  // m/s
    angular: f64, // rad/s
}

const LEVELS: [SpeedLevel; 3] = [
    SpeedLevel { label: "slow", linear: 0.1, angular: 0.5 },
    SpeedLevel { label: "normal", linear: 0.3, angular: 1.0 },
    SpeedLevel { label: "fast", linear: 0.6, angular: 2.0 },
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    /// Unit direction in the robot frame (+x right, +y forward) and rotation sign
    Move { x: f64, y: f64, turn: f64 },
    Level(usize),
    Stop,
    Quit,
}

fn action_for(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char('w') => Action::Move { x: 0.0, y: 1.0, turn: 0.0 },
        KeyCode::Char('s') => Action::Move { x: 0.0, y: -1.0, turn: 0.0 },
        KeyCode::Char('a') => Action::Move { x: -1.0, y: 0.0, turn: 0.0 },
        KeyCode::Char('d') => Action::Move { x: 1.0, y: 0.0, turn: 0.0 },
        // Positive rotation is clockwise
        KeyCode::Char('z') => Action::Move { x: 0.0, y: 0.0, turn: -1.0 },
        KeyCode::Char('x') => Action::Move { x: 0.0, y: 0.0, turn: 1.0 },
        KeyCode::Char(c @ '1'..='3') => Action::Level(c as usize - '1' as usize),
        KeyCode::Char(' ') => Action::Stop,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

struct Teleop {
    level: SpeedLevel,
    cmd: MotionCommand,
    last_move: Instant,
}

impl Teleop {
    fn new() -> Self {
        Self {
            level: LEVELS[0],
            cmd: MotionCommand::default(),
            last_move: Instant::now(),
        }
    }

    /// Apply one key action; false means quit
    fn handle(&mut self, action: Action) -> bool {
        match action {
            Action::Move { x, y, turn } => {
                // Keys only touch their own axis
                if x != 0.0 {
                    self.cmd.x_vel = x * self.level.linear;
                }
                if y != 0.0 {
                    self.cmd.y_vel = y * self.level.linear;
                }
                if turn != 0.0 {
                    self.cmd.rotation = turn * self.level.angular;
                }
                self.last_move = Instant::now();
            }
            Action::Level(i) => {
                self.level = LEVELS[i];
                info!("Speed: {}", self.level.label);
            }
            Action::Stop => self.cmd = MotionCommand::default(),
            Action::Quit => return false,
        }
        true
    }

    /// Command to publish this cycle
    fn current(&mut self) -> MotionCommand {
        if self.last_move.elapsed() > RELEASE_AFTER {
            self.cmd = MotionCommand::default();
        }
        self.cmd
    }
}

async fn drive(publisher: &zenoh::pubsub::Publisher<'_>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let period = Duration::from_millis(1000 / LOOP_HZ);
    let mut teleop = Teleop::new();

    loop {
        if event::poll(period)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release {
                    if let Some(action) = action_for(key.code) {
                        if !teleop.handle(action) {
                            break;
                        }
                    }
                }
            }
        }
        publisher.put(serde_json::to_string(&teleop.current())?).await?;
    }

    // Leave the base stopped
    publisher.put(serde_json::to_string(&MotionCommand::default())?).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_BASE).await?;
    info!("Publishing motion commands on {}", TOPIC_CMD_BASE);
    info!("W/S/A/D move, Z/X rotate, 1-3 speed, Space stop, Q quit");

    enable_raw_mode()?;
    let result = drive(&publisher).await;
    disable_raw_mode()?;
    result
}
