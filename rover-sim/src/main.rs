//! Runs the rover control loop against a simulated rover, in real time.
//!
//! Commands are read from stdin (or a script), see [`commands`] for the syntax.

use std::{
    error::Error,
    fs::File,
    io::{self, BufReader},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use high_level_cmds::Mode;
use line_array_driver::LineArray;
use log::{info, warn, LevelFilter};
use motion_hardware::{HBridgeMotorDriver, ServoPair};
use rover_control::{
    config::DEFAULT_CRUISE_SPEED, Behavior, BehaviorConfig, CommandArbiter, MotionConfig, Rover,
};

mod commands;
mod hardware;
mod logger;
mod plant;

use hardware::{HostClock, LogIndicator, SimI2c, SimImu, SimPwm, SimSonar};
use plant::{Plant, PlantConfig, PwmLine, SharedPlant};

static ARBITER: CommandArbiter<CriticalSectionRawMutex> =
    CommandArbiter::new(DEFAULT_CRUISE_SPEED);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Command script, stdin when not given
    #[arg(long, short)]
    script: Option<String>,

    /// Enable debug prints
    #[arg(long, short)]
    debug: bool,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f64,

    /// Mode to start in (idle, avoid, follow, line)
    #[arg(long, short, value_parser = commands::parse_mode)]
    mode: Option<Mode>,

    /// Distance from the start to the wall (cm)
    #[arg(long, default_value_t = 150.0)]
    wall: f64,

    /// Gyro bias (degrees per second)
    #[arg(long, default_value_t = 0.3)]
    drift: f64,

    /// Run without a gyro
    #[arg(long)]
    no_gyro: bool,

    /// Run without the line-sensor array
    #[arg(long)]
    no_line: bool,

    /// Interval between pose reports (seconds)
    #[arg(long, default_value_t = 1.0)]
    report: f64,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let level = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    logger::init(level).map_err(|e| e.to_string())?;

    let plant = Plant::new(PlantConfig {
        wall_x: args.wall,
        gyro_drift: args.drift,
        ..PlantConfig::default()
    });

    if let Some(mode) = args.mode {
        ARBITER.set_mode(mode);
    }
    let quit = Arc::new(AtomicBool::new(false));
    match &args.script {
        Some(path) => {
            let script = BufReader::new(File::open(path)?);
            commands::spawn_producer(script, &ARBITER, quit.clone())?
        }
        None => commands::spawn_producer(BufReader::new(io::stdin()), &ARBITER, quit.clone())?,
    };

    async_std::task::block_on(run(&args, plant, &quit))
}

async fn run(args: &Args, plant: SharedPlant, quit: &AtomicBool) -> Result<(), Box<dyn Error>> {
    let clock = HostClock::new();

    let wheels = HBridgeMotorDriver::new(
        SimPwm::new(&plant, PwmLine::Bridge(0)),
        SimPwm::new(&plant, PwmLine::Bridge(1)),
        SimPwm::new(&plant, PwmLine::Bridge(2)),
        SimPwm::new(&plant, PwmLine::Bridge(3)),
        typebool::True,
        typebool::False,
    );
    let gyro = (!args.no_gyro).then(|| SimImu::new(&plant, clock));
    let rover = Rover::new(wheels, gyro, clock, MotionConfig::default());

    let mut line = LineArray::new(SimI2c::new(&plant, !args.no_line));
    let line = match line.init().await {
        Ok(()) => Some(line),
        Err(e) => {
            warn!("Line array not answering: {:?}", e);
            None
        }
    };
    let servos = ServoPair::new(
        SimPwm::new(&plant, PwmLine::Servo(0)),
        SimPwm::new(&plant, PwmLine::Servo(1)),
    );

    let mut behavior = Behavior::new(
        rover,
        SimSonar::new(&plant),
        line,
        Some(servos),
        LogIndicator,
        &ARBITER,
        BehaviorConfig::default(),
    );
    behavior.begin().await.map_err(|e| e.to_string())?;

    let limit = Duration::try_from_secs_f64(args.seconds)?;
    let report = Duration::try_from_secs_f64(args.report)?;
    let mut next_report = report;
    while plant.elapsed() < limit && !quit.load(Ordering::Relaxed) {
        behavior.tick().await;
        if plant.elapsed() >= next_report {
            info!("{} range={:?}", plant.pose(), plant.range().map(|d| d.round()));
            next_report += report;
        }
    }

    behavior.shutdown().await.map_err(|e| e.to_string())?;
    info!("Final {} servo duty {:?}", plant.pose(), plant.servo_duty());
    Ok(())
}
