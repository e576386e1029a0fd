//! finchctl - Finch robot control CLI
//!
//! Thin client over `finch-session`: every subcommand opens a session,
//! runs one operation, and lets teardown reset the robot to idle.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finch_session::Session;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finchctl")]
#[command(about = "Finch robot control CLI - drive the wheels, LED, buzzer and read the sensors")]
#[command(version)]
struct Cli {
    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the beak LED color
    Led {
        /// Red channel (0-255)
        red: i16,
        /// Green channel (0-255)
        green: i16,
        /// Blue channel (0-255)
        blue: i16,
    },
    /// Set wheel speeds (-255..=255, negative is reverse)
    Move {
        left: i16,
        right: i16,
        /// Run for this many milliseconds, then stop
        #[arg(long)]
        ms: Option<u64>,
    },
    /// Sound the buzzer
    Beep {
        /// Frequency in Hz
        freq: u16,
        /// Hold the note this many milliseconds, then stop
        #[arg(long, default_value = "500")]
        ms: u64,
    },
    /// Print every sensor: temperature, light, obstacles, acceleration,
    /// orientation
    Sensors,
    /// Whether the robot was tapped since the last check
    Tapped,
    /// Whether the robot was shaken since the last check
    Shaken,
    /// Read the firmware ping counter (diagnostic)
    Ping,
    /// Short LED color-cycle demo
    Dance,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_sensors(session: &Session) -> Result<()> {
    let celsius = session.temperature()?;
    let light = session.light_sensors()?;
    let obstacle = session.obstacle_sensors()?;
    let a = session.accelerations()?;

    println!("temperature : {celsius:.1} °C");
    println!("light       : left {} / right {}", light.left, light.right);
    println!(
        "obstacles   : left {} / right {}",
        obstacle.left, obstacle.right
    );
    println!("acceleration: x {:+.2} y {:+.2} z {:+.2} G", a.x, a.y, a.z);

    let orientation = if session.is_level()? {
        "level"
    } else if session.is_upside_down()? {
        "upside down"
    } else if session.is_beak_up()? {
        "beak up"
    } else if session.is_beak_down()? {
        "beak down"
    } else if session.is_left_wing_down()? {
        "left wing down"
    } else if session.is_right_wing_down()? {
        "right wing down"
    } else {
        "in between"
    };
    println!("orientation : {orientation}");
    Ok(())
}

/// Cycle the beak LED through the color wheel once.
fn dance(session: &Session) -> Result<()> {
    let (mut red, mut green, mut blue) = (255i16, 0i16, 0i16);
    // Fade red into green, green into blue, blue back into red.
    for leg in 0..3 {
        for _ in 0..255 {
            match leg {
                0 => {
                    red -= 1;
                    green += 1;
                }
                1 => {
                    green -= 1;
                    blue += 1;
                }
                _ => {
                    blue -= 1;
                    red += 1;
                }
            }
            session.set_led(red, green, blue)?;
            std::thread::sleep(Duration::from_millis(2));
        }
    }
    session.set_led(0, 0, 0)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let session = Session::open().context("Failed to open a session with the Finch")?;

    match cli.command {
        Commands::Led { red, green, blue } => session.set_led(red, green, blue)?,
        Commands::Move { left, right, ms } => match ms {
            Some(ms) => session.set_motors_for(left, right, Duration::from_millis(ms))?,
            None => session.set_motors(left, right)?,
        },
        Commands::Beep { freq, ms } => session.buzzer_on_for(freq, Duration::from_millis(ms))?,
        Commands::Sensors => print_sensors(&session)?,
        Commands::Tapped => println!("{}", session.was_tapped()?),
        Commands::Shaken => println!("{}", session.was_shaken()?),
        Commands::Ping => println!("{}", session.ping_counter()?),
        Commands::Dance => dance(&session)?,
    }
    Ok(())
}
