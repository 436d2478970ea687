//! Runtime detection of seccomp support
//!
//! Probes the running kernel so callers can tell whether a compiled filter
//! could be installed here, and which filter actions the kernel understands.

use std::fs;

const ACTIONS_AVAIL_PATH: &str = "/proc/sys/kernel/seccomp/actions_avail";

/// Seccomp mode of the calling thread, as reported by `PR_GET_SECCOMP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeccompMode {
    Disabled,
    Strict,
    Filter,
}

/// Detected seccomp capabilities of the running kernel
#[derive(Debug, Clone)]
pub struct SeccompSupport {
    /// Seccomp is built into the kernel
    pub available: bool,
    /// Current mode of the calling thread, if seccomp is available
    pub mode: Option<SeccompMode>,
    /// Filter return actions the kernel advertises (e.g. `kill_process`, `log`)
    pub actions: Vec<String>,
}

impl SeccompSupport {
    /// Detect seccomp support on the current system
    pub fn detect() -> Self {
        let mode = detect_mode();
        Self {
            available: mode.is_some(),
            mode,
            actions: detect_actions(),
        }
    }

    /// Whether a new filter can be stacked on the calling thread
    pub fn can_install(&self) -> bool {
        matches!(
            self.mode,
            Some(SeccompMode::Disabled) | Some(SeccompMode::Filter)
        )
    }

    /// Whether the kernel advertises the given action name.
    ///
    /// Kernels that do not expose `actions_avail` are assumed to support
    /// everything.
    pub fn supports_action(&self, action: &str) -> bool {
        self.actions.is_empty() || self.actions.iter().any(|a| a == action)
    }

    /// Human-readable summary of detected support
    pub fn summary(&self) -> String {
        let check = |available: bool| if available { "[ok]" } else { "[--]" };
        let mut lines = vec![
            format!("{} Seccomp BPF", check(self.available)),
            format!("{} Filter installation", check(self.can_install())),
        ];
        let mode = match self.mode {
            Some(SeccompMode::Disabled) => "disabled",
            Some(SeccompMode::Strict) => "strict",
            Some(SeccompMode::Filter) => "filter",
            None => "unavailable",
        };
        lines.push(format!("     Current mode: {}", mode));
        if !self.actions.is_empty() {
            lines.push(format!("     Actions: {}", self.actions.join(" ")));
        }
        lines.join("\n")
    }
}

fn detect_mode() -> Option<SeccompMode> {
    // -1/EINVAL when seccomp is not built into the kernel
    let ret = unsafe { libc::prctl(libc::PR_GET_SECCOMP, 0, 0, 0, 0) };
    match ret {
        0 => Some(SeccompMode::Disabled),
        1 => Some(SeccompMode::Strict),
        2 => Some(SeccompMode::Filter),
        _ => None,
    }
}

fn detect_actions() -> Vec<String> {
    fs::read_to_string(ACTIONS_AVAIL_PATH)
        .map(|content| parse_actions(&content))
        .unwrap_or_default()
}

fn parse_actions(content: &str) -> Vec<String> {
    content.split_whitespace().map(str::to_string).collect()
}
