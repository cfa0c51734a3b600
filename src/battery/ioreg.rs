//! Power source backed by the `ioreg` diagnostic command.
//!
//! `ioreg -c AppleSmartBattery -w0` prints the battery registry entry as
//! indented `"Key" = Value` lines. Only one key matters per mode:
//! `ExternalConnected` for [`BatteryMode::Charging`] and `FullyCharged` for
//! [`BatteryMode::Full`]. The output format is not versioned, so anything
//! other than exactly one `Yes`/`No` entry for that key is treated as unknown.

use std::process::{Command, Stdio};

use super::{BatteryMode, PowerProbe, PowerReading};
use crate::error::BatteryError;

pub const IOREG_PROGRAM: &str = "ioreg";
pub const IOREG_ARGS: [&str; 3] = ["-c", "AppleSmartBattery", "-w0"];

/// Registry key that answers `mode`.
pub fn key_for(mode: BatteryMode) -> Option<&'static str> {
    match mode {
        BatteryMode::Ignored => None,
        BatteryMode::Charging => Some("ExternalConnected"),
        BatteryMode::Full => Some("FullyCharged"),
    }
}

/// Splits `    | |   "Key" = Token` into `("Key", "Token")`.
///
/// Leading indentation and tree-drawing `|` characters are ignored. The value
/// must be a single bare token.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start_matches(|c: char| c.is_whitespace() || c == '|');
    let rest = rest.strip_prefix('"')?;
    let (key, rest) = rest.split_once('"')?;
    if key.is_empty() {
        return None;
    }

    let value = rest.trim_start().strip_prefix('=')?.trim();
    if value.is_empty() || value.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value))
}

/// Yes/No occurrences of one key across the lines seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTally<'k> {
    key: &'k str,
    yes: u32,
    no: u32,
    /// Entries for the key whose value was neither `Yes` nor `No`.
    other: u32,
}

/// What a completed tally says about the required condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Met,
    NotMet,
    /// The key was missing or repeated.
    Ambiguous { yes: u32, no: u32 },
}

impl<'k> KeyTally<'k> {
    pub fn new(key: &'k str) -> Self {
        Self {
            key,
            yes: 0,
            no: 0,
            other: 0,
        }
    }

    /// Folds one output line into the tally.
    pub fn feed(mut self, line: &str) -> Self {
        let Some((key, value)) = parse_line(line) else {
            return self;
        };
        if key != self.key {
            return self;
        }

        match value {
            "Yes" => self.yes += 1,
            "No" => self.no += 1,
            _ => self.other += 1,
        }
        self
    }

    pub fn other(&self) -> u32 {
        self.other
    }

    pub fn verdict(&self) -> Verdict {
        match (self.yes, self.no) {
            (1, 0) => Verdict::Met,
            (0, 1) => Verdict::NotMet,
            (yes, no) => Verdict::Ambiguous { yes, no },
        }
    }
}

/// Tallies `key` over a whole `ioreg` output.
pub fn tally<'k>(text: &str, key: &'k str) -> KeyTally<'k> {
    text.lines().fold(KeyTally::new(key), KeyTally::feed)
}

/// Decides from a complete `ioreg` output.
pub fn decide(mode: BatteryMode, text: &str) -> PowerReading {
    let Some(key) = key_for(mode) else {
        return PowerReading::new(false, "ignored");
    };

    let tally = tally(text, key);
    let reading = match tally.verdict() {
        Verdict::Met => PowerReading::new(false, format!("{key} = Yes")),
        Verdict::NotMet => PowerReading::new(true, format!("{key} = No")),
        Verdict::Ambiguous { yes, no } => {
            return PowerReading::new(false, format!("{key} ambiguous ({yes} Yes, {no} No)"))
                .with_anomaly(format!(
                    "expected exactly one {:?} entry in ioreg output, found {} Yes and {} No",
                    key, yes, no
                ));
        }
    };

    match tally.other() {
        0 => reading,
        n => reading.with_anomaly(format!("ignored {} unexpected {:?} value(s)", n, key)),
    }
}

/// Runs `ioreg` once per sample.
#[derive(Debug, Clone)]
pub struct IoregProbe {
    program: String,
    args: Vec<String>,
}

impl IoregProbe {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Default for IoregProbe {
    fn default() -> Self {
        Self::new(IOREG_PROGRAM, &IOREG_ARGS)
    }
}

impl PowerProbe for IoregProbe {
    fn name(&self) -> &str {
        &self.program
    }

    fn sample(&mut self, mode: BatteryMode) -> Result<PowerReading, BatteryError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| BatteryError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(BatteryError::Unavailable(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(decide(mode, &text))
    }
}
