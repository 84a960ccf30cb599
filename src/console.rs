//! Console host: drives the lightgun from stdin.
//!
//! Stands in for the game. Each line is one call on the driver, e.g.
//! `fire 3`, `fire 0.4`, `reload`, `rumble`, `quit`.

use std::io::BufRead;
use std::path::Path;

use crate::adapters::mock_serial::MockSerialFactory;
use crate::domain::{LightgunConfig, LightgunResult, SerialPortInfo};
use crate::driver::Lightgun;
use crate::protocol::{ControlMode, ScreenMode};

/// One parsed console line.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    FireCount(i32),
    FirePercent(f32),
    Reload,
    Rumble,
    ScreenMode(ScreenMode),
    ControlMode(ControlMode),
    LedAuto,
    Enable,
    Disable,
    Ports,
    Quit,
}

const HELP: &str = "commands: fire <count>|<fraction>, reload, rumble, widescreen, standard, \
                    joystick, mouse, led-auto, enable, disable, ports, quit";

/// Parse a console line. An integer argument to `fire` is a count; anything
/// with a decimal point is a fraction.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| HELP.to_string())?;
    let arg = words.next();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "fire" => {
            let arg = arg.ok_or("fire needs a count or a fraction")?;
            if let Ok(count) = arg.parse::<i32>() {
                ConsoleCommand::FireCount(count)
            } else {
                let percent = arg
                    .parse::<f32>()
                    .map_err(|e| format!("Invalid ammo '{arg}': {e}"))?;
                ConsoleCommand::FirePercent(percent)
            }
        }
        "reload" => ConsoleCommand::Reload,
        "rumble" => ConsoleCommand::Rumble,
        "widescreen" => ConsoleCommand::ScreenMode(ScreenMode::Widescreen),
        "standard" => ConsoleCommand::ScreenMode(ScreenMode::Standard),
        "joystick" => ConsoleCommand::ControlMode(ControlMode::Joystick),
        "mouse" => ConsoleCommand::ControlMode(ControlMode::KeyboardMouse),
        "led-auto" => ConsoleCommand::LedAuto,
        "enable" => ConsoleCommand::Enable,
        "disable" => ConsoleCommand::Disable,
        "ports" => ConsoleCommand::Ports,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("Unknown command '{other}'. {HELP}")),
    };
    Ok(cmd)
}

/// Apply one command. Returns false when the console should exit.
pub fn apply(gun: &mut Lightgun, cmd: ConsoleCommand) -> bool {
    match cmd {
        ConsoleCommand::FireCount(n) => gun.fire(n),
        ConsoleCommand::FirePercent(p) => gun.fire_percent(p),
        ConsoleCommand::Reload => gun.reload(),
        ConsoleCommand::Rumble => gun.rumble(),
        ConsoleCommand::ScreenMode(mode) => gun.set_screen_mode(mode),
        ConsoleCommand::ControlMode(mode) => gun.set_control_mode(mode),
        ConsoleCommand::LedAuto => gun.enable_led_auto_mode(),
        ConsoleCommand::Enable => gun.enable(),
        ConsoleCommand::Disable => gun.disable(),
        ConsoleCommand::Ports => match gun.list_ports() {
            Ok(ports) => {
                for port in &ports {
                    println!("{}", format_port(port));
                }
            }
            Err(e) => log::error!("{e}"),
        },
        ConsoleCommand::Quit => return false,
    }
    true
}

/// One line of the `ports` listing; the port the gun is configured for is
/// starred.
fn format_port(port: &SerialPortInfo) -> String {
    let marker = if port.configured { '*' } else { ' ' };
    format!("{marker} {} ({})", port.name, port.port_type)
}

/// Load config (if a path is given), enable the gun, and serve stdin until EOF
/// or `quit`. The gun is disabled on the way out.
pub fn run(config_path: Option<&Path>) -> LightgunResult<()> {
    let config = match config_path {
        Some(path) => LightgunConfig::load(path)?,
        None => LightgunConfig::default(),
    };

    let mut gun = if std::env::var("MOCK_LIGHTGUN").is_ok_and(|v| v == "1") {
        Lightgun::new(config, Box::new(MockSerialFactory))
    } else {
        Lightgun::with_serialport(config)
    };

    log::info!(
        "Lightgun on {} at {} baud",
        gun.config().port_name,
        gun.config().baud_rate
    );
    gun.enable();
    if !gun.is_enabled() {
        log::warn!("Continuing without lightgun; commands will be ignored");
    }

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(cmd) => {
                if !apply(&mut gun, cmd) {
                    break;
                }
            }
            Err(msg) => eprintln!("{msg}"),
        }
    }

    gun.disable();
    Ok(())
}
