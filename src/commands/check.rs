//! Check command implementation.
//!
//! Validates the configuration and that the platform sources can be read.

use anyhow::{bail, Result};
use cpugate::battery::default_probe;
use cpugate::config::validate_effective_config;
use cpugate::process::default_source;
use cpugate::{BatteryMode, Config, ProcessFilter, ProcessMonitor};

/// Validates system requirements and configuration
pub fn command_check(config: &Config) -> Result<()> {
    println!("🔍 cpugate - System Check");
    println!("=========================");

    let mut all_ok = true;

    // Process table
    println!("\n📁 Checking process table...");
    let mut monitor = ProcessMonitor::new(default_source(&config.proc_root()));
    println!("   ✅ Clock rate: {} ticks/s", monitor.ticks_per_second());
    match monitor.open(&ProcessFilter::all()).map(|iter| iter.count()) {
        Ok(count) => {
            println!("   ✅ {} readable, {} processes", monitor.source_name(), count);
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    let me = std::process::id();
    match monitor.open(&ProcessFilter::pid(me)).map(|mut iter| iter.next()) {
        Ok(found) => match found {
            Some(p) if !p.executable_path.as_os_str().is_empty() => {
                println!("   ✅ Own process resolved: {}", p.executable_path.display())
            }
            Some(_) => println!("   ⚠️  Own process found, executable path unresolved"),
            None => {
                println!("   ❌ Own process (pid {}) not found", me);
                all_ok = false;
            }
        },
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Power source
    println!("\n🔋 Checking power source...");
    let mut probe = default_probe(&config.battery_status_path());
    let mode = match config.battery_mode() {
        BatteryMode::Ignored => BatteryMode::Charging,
        mode => mode,
    };
    match probe.sample(mode) {
        Ok(reading) => println!("   ✅ {} reports {:?}", probe.name(), reading.observed),
        Err(e) => {
            // Missing battery is a supported degraded state
            println!("   ⚠️  {} (throttling will never be held off)", e);
        }
    }

    // Configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }
    match config.filter() {
        Some(filter) => println!("   ✅ Target: {:?}", filter.target()),
        None => println!("   ⚠️  No target configured (--pid or --exe)"),
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        bail!("system check failed")
    }
}
