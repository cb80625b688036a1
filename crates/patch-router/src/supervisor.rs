//! Engine process supervision
//!
//! Each mode names at most one script per engine kind; the supervisor owns
//! the child process handles and guarantees at most one live instance per
//! kind. Activation stops whatever was running first, validates the script
//! on disk, spawns the runtime with its stdio piped into the log, and
//! confirms the process survived its launch window. Deactivation asks
//! nicely, waits out a bounded grace period, then kills.
//!
//! All lifecycle transitions are pushed to an event buffer the actor
//! drains, mirroring how the routing core reports its activity.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{ProcessConfig, SystemConfig};
use crate::error::RouterError;
use crate::events::RouterEvent;

/// Which creative-coding runtime an engine slot runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// SuperCollider, driven through sclang
    Audio,
    /// Processing, driven through processing-java
    Visual,
}

impl EngineKind {
    /// Both kinds, in activation order
    pub const ALL: [EngineKind; 2] = [EngineKind::Audio, EngineKind::Visual];

    /// Default launch command for this kind
    pub fn default_command(self) -> &'static str {
        match self {
            EngineKind::Audio => "sclang",
            EngineKind::Visual => "processing-java",
        }
    }

    /// Default OSC listening port for this kind
    pub fn default_port(self) -> u16 {
        match self {
            EngineKind::Audio => 57120,
            EngineKind::Visual => 12000,
        }
    }

    /// Process image names for stray-instance cleanup
    #[cfg(windows)]
    fn process_images(self) -> &'static [&'static str] {
        match self {
            EngineKind::Audio => &["sclang.exe", "scsynth.exe"],
            EngineKind::Visual => &["processing-java.exe", "java.exe"],
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Audio => write!(f, "audio"),
            EngineKind::Visual => write!(f, "visual"),
        }
    }
}

/// Lifecycle state of one engine slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// No process, none wanted
    Stopped,
    /// Process spawned, launch window still open
    Starting,
    /// Process alive past its launch window
    Running,
    /// Stop requested, grace period running
    Stopping,
    /// Launch failed (missing script, spawn error, or immediate exit)
    Failed,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Stopped => "stopped",
            EngineStatus::Starting => "starting",
            EngineStatus::Running => "running",
            EngineStatus::Stopping => "stopping",
            EngineStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Resolved launch recipe for one engine kind
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    program: String,
    args: Vec<String>,
}

impl LaunchPlan {
    /// Build a plan from a program and an argument template
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Build the plan a config declares for one kind
    pub fn from_config(system: &SystemConfig, kind: EngineKind) -> Self {
        let launcher = &system.engine(kind).launcher;
        Self {
            program: launcher.program(kind),
            args: launcher.args.clone(),
        }
    }

    /// The program to spawn
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with `{script}` substituted
    ///
    /// When no argument mentions the placeholder, the script path is
    /// appended as the final argument (the `sclang <script>` shape).
    pub fn resolve_args(&self, script: &Path) -> Vec<String> {
        let script_str = script.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{script}", &script_str))
            .collect();
        if !self.args.iter().any(|a| a.contains("{script}")) {
            args.push(script_str.into_owned());
        }
        args
    }
}

#[derive(Debug)]
struct EngineSlot {
    status: EngineStatus,
    child: Option<Child>,
    script: Option<PathBuf>,
    workdir: Option<PathBuf>,
}

impl Default for EngineSlot {
    fn default() -> Self {
        Self {
            status: EngineStatus::Stopped,
            child: None,
            script: None,
            workdir: None,
        }
    }
}

/// Owns the audio and visual engine processes
#[derive(Debug)]
pub struct ProcessSupervisor {
    audio_plan: LaunchPlan,
    visual_plan: LaunchPlan,
    audio_slot: EngineSlot,
    visual_slot: EngineSlot,
    grace: Duration,
    launch_check: Duration,
    kill_stray: bool,
    event_buffer: Vec<RouterEvent>,
}

impl ProcessSupervisor {
    /// Create a supervisor with explicit launch plans
    pub fn new(audio: LaunchPlan, visual: LaunchPlan, process: &ProcessConfig) -> Self {
        Self {
            audio_plan: audio,
            visual_plan: visual,
            audio_slot: EngineSlot::default(),
            visual_slot: EngineSlot::default(),
            grace: Duration::from_millis(process.grace_ms),
            launch_check: Duration::from_millis(process.launch_check_ms),
            kill_stray: process.kill_stray,
            event_buffer: Vec::new(),
        }
    }

    /// Create a supervisor from a config's launcher and process sections
    pub fn from_config(system: &SystemConfig) -> Self {
        Self::new(
            LaunchPlan::from_config(system, EngineKind::Audio),
            LaunchPlan::from_config(system, EngineKind::Visual),
            &system.process,
        )
    }

    fn plan(&self, kind: EngineKind) -> &LaunchPlan {
        match kind {
            EngineKind::Audio => &self.audio_plan,
            EngineKind::Visual => &self.visual_plan,
        }
    }

    fn slot(&self, kind: EngineKind) -> &EngineSlot {
        match kind {
            EngineKind::Audio => &self.audio_slot,
            EngineKind::Visual => &self.visual_slot,
        }
    }

    fn slot_mut(&mut self, kind: EngineKind) -> &mut EngineSlot {
        match kind {
            EngineKind::Audio => &mut self.audio_slot,
            EngineKind::Visual => &mut self.visual_slot,
        }
    }

    /// Lifecycle state of an engine
    pub fn status(&self, kind: EngineKind) -> EngineStatus {
        self.slot(kind).status
    }

    /// Whether an engine is past its launch window and alive
    pub fn is_running(&self, kind: EngineKind) -> bool {
        self.status(kind) == EngineStatus::Running
    }

    /// OS process id of a live engine
    pub fn pid(&self, kind: EngineKind) -> Option<u32> {
        self.slot(kind).child.as_ref().and_then(|c| c.id())
    }

    /// Script a live engine is running
    pub fn script(&self, kind: EngineKind) -> Option<&Path> {
        self.slot(kind).script.as_deref()
    }

    /// Working directory a live engine was launched in
    pub fn workdir(&self, kind: EngineKind) -> Option<&Path> {
        self.slot(kind).workdir.as_deref()
    }

    /// Drain buffered lifecycle events
    pub fn drain_events(&mut self) -> Vec<RouterEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Activate an engine for a mode
    ///
    /// Whatever instance of this kind is alive is stopped first. A `None`
    /// script leaves the engine down. The script is validated on disk
    /// before spawning; after the spawn the process must survive the
    /// launch-check window or the slot is marked `Failed`.
    pub async fn activate(
        &mut self,
        kind: EngineKind,
        script: Option<&Path>,
    ) -> Result<(), RouterError> {
        self.deactivate(kind).await;

        let Some(script) = script else {
            debug!("{} engine has no script in this mode, staying down", kind);
            return Ok(());
        };

        let script = match resolve_script(kind, script) {
            Ok(path) => path,
            Err(e) => {
                return self.fail_launch(kind, e);
            }
        };
        let workdir = match script.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let program = self.plan(kind).program().to_string();
        let args = self.plan(kind).resolve_args(&script);
        info!("starting {} engine: {} {}", kind, program, args.join(" "));
        self.slot_mut(kind).status = EngineStatus::Starting;

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(&workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                return self.fail_launch(
                    kind,
                    RouterError::SpawnFailed {
                        command: program,
                        source,
                    },
                );
            }
        };

        if let Some(stdout) = child.stdout.take() {
            spawn_relay(kind, false, stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_relay(kind, true, stderr);
        }

        // engines that reject their script tend to die within the window
        tokio::time::sleep(self.launch_check).await;
        match child.try_wait() {
            Ok(Some(status)) => self.fail_launch(
                kind,
                RouterError::EngineExited {
                    kind,
                    status: status.to_string(),
                },
            ),
            Ok(None) => {
                let pid = child.id();
                info!("{} engine running (pid {:?})", kind, pid);
                self.event_buffer.push(RouterEvent::EngineStarted {
                    kind,
                    pid,
                    script: script.clone(),
                });
                let slot = self.slot_mut(kind);
                slot.status = EngineStatus::Running;
                slot.child = Some(child);
                slot.script = Some(script);
                slot.workdir = Some(workdir);
                Ok(())
            }
            Err(source) => self.fail_launch(kind, RouterError::Io(source)),
        }
    }

    fn fail_launch(&mut self, kind: EngineKind, error: RouterError) -> Result<(), RouterError> {
        warn!("{} engine launch failed: {}", kind, error);
        self.slot_mut(kind).status = EngineStatus::Failed;
        self.event_buffer.push(RouterEvent::EngineFailed {
            kind,
            message: error.to_string(),
        });
        Err(error)
    }

    /// Stop an engine if one is alive
    ///
    /// Asks the process to stop, waits out the grace period, then force
    /// kills. Calling this with nothing alive is a no-op.
    pub async fn deactivate(&mut self, kind: EngineKind) {
        let grace = self.grace;
        let slot = self.slot_mut(kind);
        let Some(mut child) = slot.child.take() else {
            return;
        };
        slot.status = EngineStatus::Stopping;
        slot.script = None;
        slot.workdir = None;

        info!("stopping {} engine", kind);
        request_stop(&mut child);
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => debug!("{} engine exited: {}", kind, status),
            Ok(Err(e)) => warn!("error waiting for {} engine: {}", kind, e),
            Err(_) => {
                warn!("{} engine ignored the stop request, killing", kind);
                if let Err(e) = child.kill().await {
                    warn!("failed to kill {} engine: {}", kind, e);
                }
            }
        }

        if self.kill_stray {
            kill_stray_instances(kind);
        }

        self.slot_mut(kind).status = EngineStatus::Stopped;
        self.event_buffer.push(RouterEvent::EngineStopped { kind });
    }

    /// Notice engines that exited on their own
    ///
    /// Flips their slots back to `Stopped` and reports the exit through
    /// the event buffer.
    pub fn reap(&mut self) {
        for kind in EngineKind::ALL {
            let slot = self.slot_mut(kind);
            let status = match slot.child.as_mut() {
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => Some(status.to_string()),
                    Ok(None) => None,
                    Err(e) => {
                        warn!("failed to poll {} engine: {}", kind, e);
                        None
                    }
                },
                None => None,
            };
            if let Some(status) = status {
                warn!("{} engine exited on its own: {}", kind, status);
                slot.child = None;
                slot.script = None;
                slot.workdir = None;
                slot.status = EngineStatus::Stopped;
                self.event_buffer
                    .push(RouterEvent::EngineExited { kind, status });
            }
        }
    }

    /// Stop both engines
    pub async fn shutdown_all(&mut self) {
        for kind in EngineKind::ALL {
            self.deactivate(kind).await;
        }
    }
}

/// Validate a script path for a kind
///
/// Visual scripts may be Processing sketch folders, which must contain a
/// same-named `.pde` file.
fn resolve_script(kind: EngineKind, script: &Path) -> Result<PathBuf, RouterError> {
    if !script.exists() {
        return Err(RouterError::ScriptMissing(script.to_path_buf()));
    }
    if kind == EngineKind::Visual && script.is_dir() {
        let Some(name) = script.file_name() else {
            return Err(RouterError::ScriptMissing(script.to_path_buf()));
        };
        let pde = script.join(format!("{}.pde", name.to_string_lossy()));
        if !pde.exists() {
            return Err(RouterError::ScriptMissing(pde));
        }
    }
    Ok(script.to_path_buf())
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    // sclang and processing-java both exit cleanly on SIGTERM
    if let Some(pid) = child.id() {
        // SAFETY: pid belongs to a child this supervisor spawned and still holds
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    // no graceful signal on this platform
    if let Err(e) = child.start_kill() {
        warn!("failed to stop engine process: {}", e);
    }
}

#[cfg(windows)]
fn kill_stray_instances(kind: EngineKind) {
    use std::process::Command as StdCommand;
    for image in kind.process_images() {
        debug!("cleaning up stray {} instances", image);
        let _ = StdCommand::new("taskkill")
            .args(["/F", "/IM", image])
            .output();
    }
}

#[cfg(not(windows))]
fn kill_stray_instances(kind: EngineKind) {
    debug!("stray {} cleanup not supported on this platform", kind);
}

fn spawn_relay<R>(kind: EngineKind, elevated: bool, source: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(source).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if elevated {
                warn!("[{}] {}", kind, line);
            } else {
                info!("[{}] {}", kind, line);
            }
        }
    });
}
