//! Configuration schema and loading
//!
//! The router is driven by a single TOML document: a `[system]` table for
//! serial/OSC/process settings and a `[[modes]]` array whose order defines
//! the mode cycle. Parsing happens here; cross-reference validation (mode
//! names, control keys, ranges) happens when the config is compiled into a
//! [`ModeRegistry`](crate::registry::ModeRegistry).
//!
//! # Format
//!
//! ```toml
//! [system]
//! mode_button = "btn7"
//!
//! [system.serial]
//! adc_resolution = "10-bit"
//!
//! [[modes]]
//! name = "ambient"
//! audio = { script = "patches/ambient.scd" }
//!
//! [modes.controls.buttons.btn1]
//! actions = [{ target = "audio", command = "/trigger", params = [1] }]
//!
//! [modes.controls.pots.pot1]
//! target = "audio"
//! command = "/filter/cutoff"
//! range = { in_min = 0.0, in_max = 1023.0, out_min = 20.0, out_max = 20000.0 }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use patch_protocol::{AdcResolution, RangeMap};

use crate::error::ConfigError;
use crate::supervisor::EngineKind;

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// System-wide settings
    pub system: SystemConfig,
    /// Mode definitions, in cycle order
    #[serde(default)]
    pub modes: Vec<ModeConfig>,
}

impl HubConfig {
    /// Load and parse a config file
    ///
    /// This only checks TOML syntax and field shapes. Compile the result
    /// with [`ModeRegistry::from_config`](crate::registry::ModeRegistry::from_config)
    /// to validate cross-references before running.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: HubConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// System-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Mode to activate at startup (defaults to the first defined mode)
    #[serde(default)]
    pub initial_mode: Option<String>,
    /// Button key (one-based, e.g. `"btn7"`) that advances the mode cycle
    pub mode_button: String,
    /// Serial link settings
    pub serial: SerialConfig,
    /// Audio engine endpoint and launcher
    #[serde(default)]
    pub audio: EngineConfig,
    /// Visual engine endpoint and launcher
    #[serde(default)]
    pub visual: EngineConfig,
    /// Child process handling
    #[serde(default)]
    pub process: ProcessConfig,
}

impl SystemConfig {
    /// Engine settings for a kind
    pub fn engine(&self, kind: EngineKind) -> &EngineConfig {
        match kind {
            EngineKind::Audio => &self.audio,
            EngineKind::Visual => &self.visual,
        }
    }
}

/// Serial link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g. `/dev/ttyACM0`, `COM3`); auto-detected when absent
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate (default 9600)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// ADC resolution of the board's pot readings
    pub adc_resolution: AdcResolution,
    /// Delay after opening the port, in milliseconds (boards reset on open)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Reconnect behavior after a lost connection
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Reconnect behavior for the serial source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Connection attempts before giving up
    pub max_retries: u32,
    /// Initial delay between attempts, in milliseconds
    pub backoff_ms: u64,
    /// Delay ceiling for the exponential backoff, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

/// OSC endpoint and launcher for one engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Destination host for OSC messages (default 127.0.0.1)
    pub host: Option<String>,
    /// Destination UDP port (default 57120 for audio, 12000 for visual)
    pub port: Option<u16>,
    /// How to launch the engine runtime
    pub launcher: LauncherConfig,
}

impl EngineConfig {
    /// Resolve the OSC destination as `(host, port)`
    pub fn endpoint(&self, kind: EngineKind) -> (String, u16) {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = self.port.unwrap_or(kind.default_port());
        (host, port)
    }
}

/// How to launch an engine runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Launch command (defaults to the kind's standard runtime)
    pub command: Option<String>,
    /// Per-OS command override
    pub windows: Option<String>,
    /// Per-OS command override
    pub macos: Option<String>,
    /// Per-OS command override
    pub linux: Option<String>,
    /// Argument template; the literal `{script}` is replaced with the
    /// script path, which is appended last when no argument mentions it
    pub args: Vec<String>,
}

impl LauncherConfig {
    /// Resolve the program to run on the host OS
    pub fn program(&self, kind: EngineKind) -> String {
        let os_override = if cfg!(target_os = "windows") {
            self.windows.as_ref()
        } else if cfg!(target_os = "macos") {
            self.macos.as_ref()
        } else {
            self.linux.as_ref()
        };
        os_override
            .or(self.command.as_ref())
            .cloned()
            .unwrap_or_else(|| kind.default_command().to_string())
    }
}

/// Child process handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Grace period between the stop signal and a force kill, in milliseconds
    pub grace_ms: u64,
    /// Delay before checking that a freshly launched engine is still up,
    /// in milliseconds
    pub launch_check_ms: u64,
    /// Also kill stray engine instances by image name where the OS
    /// supports it (off by default)
    pub kill_stray: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            launch_check_ms: 1000,
            kill_stray: false,
        }
    }
}

/// One mode definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Mode name, unique across the config
    pub name: String,
    /// Audio script for this mode (the audio engine stays down when absent)
    #[serde(default)]
    pub audio: Option<ScriptConfig>,
    /// Visual sketch for this mode (the visual engine stays down when absent)
    #[serde(default)]
    pub visual: Option<ScriptConfig>,
    /// Control bindings active in this mode
    #[serde(default)]
    pub controls: ControlsConfig,
}

/// Script reference for one engine in one mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Path to the script (a `.scd` file, or a Processing sketch folder)
    pub script: PathBuf,
}

/// Control bindings for one mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Button bindings, keyed by one-based label (`btn1`..`btn7`,
    /// `mbtn_1`..`mbtn_16`)
    pub buttons: HashMap<String, ButtonConfig>,
    /// Pot bindings, keyed by one-based label (`pot1`..`pot3`)
    pub pots: HashMap<String, PotConfig>,
}

/// Actions fired when a button is pressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Messages to send, in order
    pub actions: Vec<ActionConfig>,
}

/// One outbound message bound to a button press
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Destination engine
    pub target: EngineKind,
    /// OSC address pattern (must start with `/`)
    pub command: String,
    /// Fixed message arguments
    #[serde(default)]
    pub params: Vec<ParamValue>,
}

/// Continuous binding for one pot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotConfig {
    /// Destination engine
    pub target: EngineKind,
    /// OSC address pattern (must start with `/`)
    pub command: String,
    /// Fixed arguments sent before the mapped value
    #[serde(default)]
    pub params: Vec<ParamValue>,
    /// Value mapping (defaults to the full ADC span mapped onto 0.0..1.0)
    #[serde(default)]
    pub range: Option<RangeMap>,
    /// Output format of the mapped value
    #[serde(default)]
    pub format: ValueFormat,
}

/// Output format for a mapped pot value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
    /// 32-bit float argument
    Float,
    /// Rounded 32-bit integer argument
    Integer,
}

impl Default for ValueFormat {
    fn default() -> Self {
        Self::Float
    }
}

/// One fixed OSC argument in a config file
///
/// TOML's native types map onto the three supported OSC argument types, so
/// `params = [1, 2.5, "go"]` works without any tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// 32-bit integer argument
    Int(i32),
    /// 32-bit float argument
    Float(f32),
    /// String argument
    Str(String),
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_settle_ms() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[system]
initial_mode = "ambient"
mode_button = "btn7"

[system.serial]
port = "/dev/ttyACM0"
adc_resolution = "10-bit"

[system.visual.launcher]
args = ["--force", "--sketch={script}", "--run"]

[[modes]]
name = "ambient"
audio = { script = "patches/ambient.scd" }
visual = { script = "sketches/ambient" }

[modes.controls.buttons.btn1]
actions = [
    { target = "audio", command = "/trigger", params = [1] },
    { target = "visual", command = "/flash", params = [0.5, "white"] },
]

[modes.controls.pots.pot1]
target = "audio"
command = "/filter/cutoff"
range = { in_min = 0.0, in_max = 1023.0, out_min = 20.0, out_max = 20000.0 }
format = "integer"

[[modes]]
name = "rhythm"
audio = { script = "patches/rhythm.scd" }
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: HubConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.system.mode_button, "btn7");
        assert_eq!(config.system.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.modes.len(), 2);
        assert_eq!(config.modes[0].name, "ambient");
        assert!(config.modes[1].visual.is_none());
    }

    #[test]
    fn test_defaults_applied() {
        let config: HubConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.system.serial.baud_rate, 9600);
        assert_eq!(config.system.serial.settle_ms, 2000);
        assert_eq!(config.system.serial.reconnect.max_retries, 5);
        assert_eq!(config.system.process.grace_ms, 500);
        assert!(!config.system.process.kill_stray);
    }

    #[test]
    fn test_endpoint_defaults_per_kind() {
        let config: HubConfig = toml::from_str(SAMPLE).unwrap();
        let (host, port) = config.system.audio.endpoint(EngineKind::Audio);
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 57120);
        let (_, port) = config.system.visual.endpoint(EngineKind::Visual);
        assert_eq!(port, 12000);
    }

    #[test]
    fn test_untagged_params() {
        let config: HubConfig = toml::from_str(SAMPLE).unwrap();
        let actions = &config.modes[0].controls.buttons["btn1"].actions;
        assert_eq!(actions[0].params, vec![ParamValue::Int(1)]);
        assert_eq!(
            actions[1].params,
            vec![
                ParamValue::Float(0.5),
                ParamValue::Str("white".to_string())
            ]
        );
    }

    #[test]
    fn test_pot_binding_fields() {
        let config: HubConfig = toml::from_str(SAMPLE).unwrap();
        let pot = &config.modes[0].controls.pots["pot1"];
        assert_eq!(pot.target, EngineKind::Audio);
        assert_eq!(pot.format, ValueFormat::Integer);
        let range = pot.range.as_ref().unwrap();
        assert_eq!(range.out_max, 20000.0);
    }

    #[test]
    fn test_missing_adc_resolution_rejected() {
        let toml = r#"
[system]
mode_button = "btn7"

[system.serial]
port = "/dev/ttyACM0"

[[modes]]
name = "only"
"#;
        assert!(toml::from_str::<HubConfig>(toml).is_err());
    }

    #[test]
    fn test_launcher_program_resolution() {
        let launcher = LauncherConfig::default();
        assert_eq!(launcher.program(EngineKind::Audio), "sclang");
        assert_eq!(launcher.program(EngineKind::Visual), "processing-java");

        let custom = LauncherConfig {
            command: Some("/opt/sc/bin/sclang".to_string()),
            ..Default::default()
        };
        assert_eq!(custom.program(EngineKind::Audio), "/opt/sc/bin/sclang");
    }
}
