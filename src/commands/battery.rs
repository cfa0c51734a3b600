//! Battery command implementation.

use anyhow::Result;
use cpugate::battery::default_probe;
use cpugate::{should_pause, BatteryMode, BatteryStatus, Config};

pub fn command_battery(config: &Config) -> Result<()> {
    let mode = config.battery_mode();
    println!("🔋 cpugate - Battery Gate");
    println!("========================");
    println!("   Mode: {}", mode);

    if mode == BatteryMode::Ignored {
        println!("   Battery is ignored, throttling is never held off");
        return Ok(());
    }

    let mut probe = default_probe(&config.battery_status_path());
    let mut status = BatteryStatus::new(mode);
    let pause = should_pause(&mut status, probe.as_mut());

    println!("   Source: {}", probe.name());
    match status.last_observed() {
        Some(observed) => println!("   Observed: {}", observed),
        None => println!("   Observed: unavailable (failing open)"),
    }
    if pause {
        println!("   ⏸️  Throttling held off until the battery is {}", mode);
    } else {
        println!("   ▶️  Throttling proceeds");
    }
    Ok(())
}
