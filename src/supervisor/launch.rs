//! Launch request validation and monitor command construction.
//!
//! A [`LaunchRequest`] is the JSON body of `POST /start`. Each present field
//! maps to one monitor flag; absent fields are left out of the argument list
//! so the monitor applies its own defaults.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Deserializer, de};
use tokio::process::Command;

use crate::constants::{DEFAULT_PYTHON, PYTHON_ENV};
use crate::error::{Error, Result};

const FLAG_CONTINUOUS: &str = "-c";
const FLAG_DIRECTORY: &str = "-d";
const FLAG_CHANGE_THRESHOLD: &str = "-t";
const FLAG_PREFIX: &str = "-p";
const FLAG_INTERVAL: &str = "-i";
const FLAG_CONFIRM_AREA: &str = "--confirm-area";

/// Options for a monitor launch. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LaunchRequest {
    /// Keep capturing after the first snapshot.
    #[serde(default)]
    pub continuous: bool,
    /// Output directory for snapshots.
    #[serde(default, deserialize_with = "optional_text")]
    pub directory: Option<String>,
    /// Fraction of changed pixels that triggers a snapshot.
    #[serde(default, alias = "changeThreshold", deserialize_with = "optional_number")]
    pub change_threshold: Option<f64>,
    /// Snapshot file name prefix.
    #[serde(default, deserialize_with = "optional_text")]
    pub prefix: Option<String>,
    /// Seconds between screen captures.
    #[serde(default, deserialize_with = "optional_number")]
    pub interval: Option<f64>,
    /// Ask the user to confirm the watched area before starting.
    #[serde(default, alias = "confirmArea")]
    pub confirm_area: bool,
}

impl LaunchRequest {
    /// Checks value ranges without building anything.
    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.change_threshold
            && (!threshold.is_finite() || threshold < 0.0)
        {
            return Err(Error::invalid_request(format!(
                "change_threshold must be a non-negative number, got {threshold}"
            )));
        }
        if let Some(interval) = self.interval
            && (!interval.is_finite() || interval <= 0.0)
        {
            return Err(Error::invalid_request(format!(
                "interval must be a positive number, got {interval}"
            )));
        }
        for (field, value) in [("directory", &self.directory), ("prefix", &self.prefix)] {
            if value.as_deref().is_some_and(|v| v.contains('\0')) {
                return Err(Error::invalid_request(format!(
                    "{field} must not contain null bytes"
                )));
            }
        }
        Ok(())
    }

    /// Builds the monitor argument list in fixed flag order.
    pub fn to_args(&self) -> Result<Vec<String>> {
        self.validate()?;

        let mut args = Vec::new();
        if self.continuous {
            args.push(FLAG_CONTINUOUS.to_string());
        }
        if let Some(directory) = &self.directory {
            args.push(FLAG_DIRECTORY.to_string());
            args.push(directory.clone());
        }
        if let Some(threshold) = self.change_threshold {
            args.push(FLAG_CHANGE_THRESHOLD.to_string());
            args.push(format_number(threshold));
        }
        if let Some(prefix) = &self.prefix {
            args.push(FLAG_PREFIX.to_string());
            args.push(prefix.clone());
        }
        if let Some(interval) = self.interval {
            args.push(FLAG_INTERVAL.to_string());
            args.push(format_number(interval));
        }
        if self.confirm_area {
            args.push(FLAG_CONFIRM_AREA.to_string());
        }
        Ok(args)
    }
}

/// Shortest round-trip rendering: `5` for 5.0, `0.1` for 0.1.
fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// Blank strings count as absent.
fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberInput {
    Number(f64),
    Text(String),
}

/// Accepts JSON numbers and numeric strings (form input); blank is absent.
fn optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberInput::Number(n)) => Ok(Some(n)),
        Some(NumberInput::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected a number, got '{text}'")))
        },
    }
}

// =============================================================================
// Monitor Command
// =============================================================================

/// Returns the interpreter to run the monitor with.
///
/// `SNAPWATCH_PYTHON` wins when set and non-empty; otherwise the platform
/// default is used.
pub fn resolve_interpreter() -> OsString {
    interpreter_or_default(std::env::var_os(PYTHON_ENV))
}

fn interpreter_or_default(value: Option<OsString>) -> OsString {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| OsString::from(DEFAULT_PYTHON))
}

/// How to invoke the monitor: program and fixed leading arguments. The
/// child always runs in the service's working directory.
#[derive(Debug, Clone)]
pub struct MonitorCommand {
    program: OsString,
    base_args: Vec<OsString>,
}

impl MonitorCommand {
    /// Runs `script` with the resolved interpreter.
    pub fn python_script(script: impl Into<PathBuf>) -> Self {
        Self::new(resolve_interpreter(), [script.into().into_os_string()])
    }

    pub fn new<I, A>(program: impl Into<OsString>, base_args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Builds a command with piped output and UTF-8 forced for Python.
    pub(crate) fn build(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .kill_on_drop(true);
        cmd
    }
}
