//! Mode registry
//!
//! Compiles the raw config into an immutable table of modes and owns the
//! current-mode cursor. All cross-reference validation happens here, at
//! load time: unknown control keys, bad OSC addresses, and degenerate pot
//! ranges are rejected before the router starts, not discovered mid-set.
//!
//! Config keys use one-based labels (`btn1`, `pot1`); compiled bindings are
//! keyed by the zero-based ids the decoder emits.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::warn;

use patch_protocol::{parse_button_key, parse_pot_key, AdcResolution, RangeMap};

use crate::config::{HubConfig, ParamValue, ValueFormat};
use crate::error::ConfigError;
use crate::supervisor::EngineKind;

/// One outbound message template
#[derive(Debug, Clone)]
pub struct ActionSpec {
    /// Destination engine
    pub target: EngineKind,
    /// OSC address pattern
    pub command: String,
    /// Fixed message arguments
    pub params: Vec<ParamValue>,
}

/// Compiled continuous binding for one pot
#[derive(Debug, Clone)]
pub struct PotBinding {
    /// Message template; the mapped value is appended after `params`
    pub action: ActionSpec,
    /// Raw-to-output mapping
    pub range: RangeMap,
    /// Output format of the mapped value
    pub format: ValueFormat,
}

/// One compiled mode
#[derive(Debug, Clone)]
pub struct ModeDefinition {
    /// Mode name from the config
    pub name: String,
    audio_script: Option<PathBuf>,
    visual_script: Option<PathBuf>,
    buttons: HashMap<u8, Vec<ActionSpec>>,
    pots: HashMap<u8, PotBinding>,
}

impl ModeDefinition {
    /// Script for an engine kind, if this mode runs that engine
    pub fn script(&self, kind: EngineKind) -> Option<&Path> {
        match kind {
            EngineKind::Audio => self.audio_script.as_deref(),
            EngineKind::Visual => self.visual_script.as_deref(),
        }
    }
}

/// Ordered mode table with the current-mode cursor
///
/// Mode order in the config is the cycle order; `advance` wraps from the
/// last mode back to the first.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: Vec<ModeDefinition>,
    current: usize,
    mode_button: u8,
    resolution: AdcResolution,
}

impl ModeRegistry {
    /// Compile and validate a parsed config
    ///
    /// Fails on the first structural problem found: no modes, duplicate
    /// mode names, an unknown initial mode, unrecognized control keys, OSC
    /// addresses without a leading `/`, or degenerate pot input ranges.
    pub fn from_config(config: &HubConfig) -> Result<Self, ConfigError> {
        if config.modes.is_empty() {
            return Err(ConfigError::NoModes);
        }

        let mode_button = parse_button_key(&config.system.mode_button)
            .ok_or_else(|| ConfigError::InvalidModeButton(config.system.mode_button.clone()))?;

        let resolution = config.system.serial.adc_resolution;

        let mut seen = HashSet::new();
        let mut modes = Vec::with_capacity(config.modes.len());
        for mode in &config.modes {
            if !seen.insert(mode.name.clone()) {
                return Err(ConfigError::DuplicateMode(mode.name.clone()));
            }
            modes.push(compile_mode(mode, mode_button, resolution)?);
        }

        let current = match &config.system.initial_mode {
            Some(name) => modes
                .iter()
                .position(|m| &m.name == name)
                .ok_or_else(|| ConfigError::UnknownInitialMode(name.clone()))?,
            None => 0,
        };

        Ok(Self {
            modes,
            current,
            mode_button,
            resolution,
        })
    }

    /// Number of modes in the cycle
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Whether the registry holds no modes (never true after `from_config`)
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Currently active mode
    pub fn current(&self) -> &ModeDefinition {
        &self.modes[self.current]
    }

    /// Index of the currently active mode
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Advance the cursor to the next mode in the cycle and return it
    pub fn advance(&mut self) -> &ModeDefinition {
        self.current = (self.current + 1) % self.modes.len();
        &self.modes[self.current]
    }

    /// Zero-based id of the mode-advance button
    pub fn mode_button(&self) -> u8 {
        self.mode_button
    }

    /// ADC resolution the config declared
    pub fn resolution(&self) -> AdcResolution {
        self.resolution
    }

    /// Actions bound to a button in the current mode
    pub fn resolve_button(&self, id: u8) -> Option<&[ActionSpec]> {
        self.modes[self.current]
            .buttons
            .get(&id)
            .map(Vec::as_slice)
    }

    /// Binding for a pot in the current mode
    pub fn resolve_pot(&self, id: u8) -> Option<&PotBinding> {
        self.modes[self.current].pots.get(&id)
    }
}

fn compile_mode(
    mode: &crate::config::ModeConfig,
    mode_button: u8,
    resolution: AdcResolution,
) -> Result<ModeDefinition, ConfigError> {
    let mut buttons = HashMap::new();
    for (key, binding) in &mode.controls.buttons {
        let id = parse_button_key(key).ok_or_else(|| ConfigError::UnknownButtonKey {
            mode: mode.name.clone(),
            key: key.clone(),
        })?;
        if id == mode_button {
            warn!(
                "mode {}: binding on {} is shadowed by the mode-advance button",
                mode.name, key
            );
        }
        let mut actions = Vec::with_capacity(binding.actions.len());
        for action in &binding.actions {
            check_command(&mode.name, &action.command)?;
            actions.push(ActionSpec {
                target: action.target,
                command: action.command.clone(),
                params: action.params.clone(),
            });
        }
        buttons.insert(id, actions);
    }

    let mut pots = HashMap::new();
    for (key, binding) in &mode.controls.pots {
        let id = parse_pot_key(key).ok_or_else(|| ConfigError::UnknownPotKey {
            mode: mode.name.clone(),
            key: key.clone(),
        })?;
        check_command(&mode.name, &binding.command)?;
        let range = binding
            .range
            .unwrap_or_else(|| RangeMap::unit(resolution.span()));
        if range.is_degenerate() {
            return Err(ConfigError::DegenerateRange {
                mode: mode.name.clone(),
                key: key.clone(),
            });
        }
        pots.insert(
            id,
            PotBinding {
                action: ActionSpec {
                    target: binding.target,
                    command: binding.command.clone(),
                    params: binding.params.clone(),
                },
                range,
                format: binding.format,
            },
        );
    }

    Ok(ModeDefinition {
        name: mode.name.clone(),
        audio_script: mode.audio.as_ref().map(|s| s.script.clone()),
        visual_script: mode.visual.as_ref().map(|s| s.script.clone()),
        buttons,
        pots,
    })
}

fn check_command(mode: &str, command: &str) -> Result<(), ConfigError> {
    if command.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::BadCommandPath {
            mode: mode.to_string(),
            command: command.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(extra: &str) -> HubConfig {
        let toml = format!(
            r#"
[system]
mode_button = "btn7"

[system.serial]
adc_resolution = "10-bit"

[[modes]]
name = "alpha"
audio = {{ script = "patches/alpha.scd" }}

[modes.controls.buttons.btn1]
actions = [{{ target = "audio", command = "/trigger", params = [1] }}]

[modes.controls.pots.pot1]
target = "audio"
command = "/cutoff"

[[modes]]
name = "beta"

[[modes]]
name = "gamma"
{extra}
"#
        );
        toml::from_str(&toml).unwrap()
    }

    #[test]
    fn test_compile_and_resolve() {
        let registry = ModeRegistry::from_config(&sample_config("")).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.current().name, "alpha");
        assert_eq!(registry.mode_button(), 6);

        let actions = registry.resolve_button(0).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].command, "/trigger");

        let binding = registry.resolve_pot(0).unwrap();
        assert_eq!(binding.action.command, "/cutoff");
        // default range covers the 10-bit span onto 0..1
        assert_eq!(binding.range.in_max, 1023.0);
        assert_eq!(binding.range.out_max, 1.0);
    }

    #[test]
    fn test_advance_wraps() {
        let mut registry = ModeRegistry::from_config(&sample_config("")).unwrap();
        assert_eq!(registry.advance().name, "beta");
        assert_eq!(registry.advance().name, "gamma");
        assert_eq!(registry.advance().name, "alpha");
        assert_eq!(registry.current_index(), 0);
    }

    #[test]
    fn test_unbound_controls_resolve_to_none() {
        let registry = ModeRegistry::from_config(&sample_config("")).unwrap();
        assert!(registry.resolve_button(5).is_none());
        assert!(registry.resolve_pot(2).is_none());
    }

    #[test]
    fn test_initial_mode_selected() {
        let mut config = sample_config("");
        config.system.initial_mode = Some("beta".to_string());
        let registry = ModeRegistry::from_config(&config).unwrap();
        assert_eq!(registry.current().name, "beta");
        assert_eq!(registry.current_index(), 1);
    }

    #[test]
    fn test_unknown_initial_mode_rejected() {
        let mut config = sample_config("");
        config.system.initial_mode = Some("missing".to_string());
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::UnknownInitialMode(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_no_modes_rejected() {
        let mut config = sample_config("");
        config.modes.clear();
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::NoModes)
        ));
    }

    #[test]
    fn test_duplicate_mode_rejected() {
        let mut config = sample_config("");
        config.modes[2].name = "alpha".to_string();
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::DuplicateMode(name)) if name == "alpha"
        ));
    }

    #[test]
    fn test_bad_mode_button_rejected() {
        let mut config = sample_config("");
        config.system.mode_button = "btn9".to_string();
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::InvalidModeButton(_))
        ));
    }

    #[test]
    fn test_unknown_button_key_rejected() {
        let config = sample_config(
            r#"
[modes.controls.buttons.btn99]
actions = [{ target = "audio", command = "/x" }]
"#,
        );
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::UnknownButtonKey { key, .. }) if key == "btn99"
        ));
    }

    #[test]
    fn test_command_without_slash_rejected() {
        let config = sample_config(
            r#"
[modes.controls.pots.pot2]
target = "visual"
command = "speed"
"#,
        );
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::BadCommandPath { command, .. }) if command == "speed"
        ));
    }

    #[test]
    fn test_degenerate_range_rejected() {
        let config = sample_config(
            r#"
[modes.controls.pots.pot2]
target = "visual"
command = "/speed"
range = { in_min = 512.0, in_max = 512.0, out_min = 0.0, out_max = 1.0 }
"#,
        );
        assert!(matches!(
            ModeRegistry::from_config(&config),
            Err(ConfigError::DegenerateRange { key, .. }) if key == "pot2"
        ));
    }

    #[test]
    fn test_matrix_button_keys_compile() {
        let config = sample_config(
            r#"
[modes.controls.buttons.mbtn_1]
actions = [{ target = "visual", command = "/cell", params = [0] }]
"#,
        );
        let mut registry = ModeRegistry::from_config(&config).unwrap();
        registry.advance();
        registry.advance();
        // mbtn_1 is matrix id 0, folded to 16 in the shared id space
        assert!(registry.resolve_button(16).is_some());
    }
}
