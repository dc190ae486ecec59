//! Stage Probe
//!
//! A standalone tool to check communication with an APT motion controller.
//! Reads back the hardware information and every parameter block of one
//! channel, printing them as JSON.
//!
//! Usage:
//!   cargo run --example stage_probe -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyUSB0)
//!   --channel N       Channel to query (default: 1)
//!   --timeout MS      Command timeout in ms (default: 100)
//!   --home            Home the channel after reading parameters
//!   --goto DEGREES    Move to an absolute angle after reading parameters

use aptstage_core::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = ConnectionConfig::default();
    let mut channel = 1u16;
    let mut home = false;
    let mut target: Option<f64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    config.port_name = args[i].clone();
                }
            }
            "--channel" | "-c" => {
                i += 1;
                if i < args.len() {
                    channel = args[i].parse().unwrap_or(1);
                }
            }
            "--timeout" | "-t" => {
                i += 1;
                if i < args.len() {
                    config.timeout_ms = args[i].parse().unwrap_or(100);
                }
            }
            "--home" => home = true,
            "--goto" => {
                i += 1;
                if i < args.len() {
                    target = args[i].parse().ok();
                }
            }
            "--help" | "-h" => {
                println!(
                    "Usage: stage_probe [--port PORT] [--channel N] [--timeout MS] \
                     [--home] [--goto DEGREES]"
                );
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    println!("=== APT Stage Probe ===");
    println!("Port: {}", config.port_name);
    println!("Channel: {}", channel);
    println!();

    let mut conn = Connection::open(&config)?;
    conn.identify()?;

    let info = conn.get_hardware_info()?;
    println!(
        "Controller: {} (serial {}, firmware {}, {} channel(s))",
        info.model, info.serial_number, info.firmware, info.channels
    );

    println!("Channel enabled: {}", conn.get_channel_state(channel)?);
    let position = conn.get_position_counter(channel)?;
    println!("Position: {} counts ({:.3} deg)", position, degrees(position));
    println!("Encoder: {} counts", conn.get_encoder_counter(channel)?);
    println!();

    println!("velocity: {}", serde_json::to_string_pretty(&conn.get_velocity(channel)?)?);
    println!("jog: {}", serde_json::to_string_pretty(&conn.get_jog(channel)?)?);
    println!("home: {}", serde_json::to_string_pretty(&conn.get_home(channel)?)?);
    println!("pid: {}", serde_json::to_string_pretty(&conn.get_pid(channel)?)?);
    println!("pot: {}", serde_json::to_string_pretty(&conn.get_pot(channel)?)?);
    println!("button: {}", serde_json::to_string_pretty(&conn.get_button(channel)?)?);
    println!("bow index: {}", conn.get_bow_index(channel)?);

    if home {
        println!();
        println!("Homing channel {}...", channel);
        let done = conn.move_home(channel)?;
        println!("Homed: {:?}", done.kind);
    }

    if let Some(angle) = target {
        println!();
        println!("Moving channel {} to {:.3} deg...", channel, angle);
        let done = conn.move_absolute_degrees(channel, angle)?;
        if let Some(status) = done.status {
            println!("Arrived at {:.3} deg", degrees(status.position));
        } else {
            println!("Move finished: {:?}", done.kind);
        }
    }

    conn.disconnect()?;
    Ok(())
}
