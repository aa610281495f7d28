//! Child environment construction.
//!
//! Children inherit a snapshot of the host environment, minus variables
//! that would make them misidentify their own shell or that mark the host
//! process itself.

use std::collections::BTreeMap;

use crate::shell::ShellKind;

/// Ordered environment snapshot handed to a child.
pub type EnvSnapshot = BTreeMap<String, String>;

/// Build the environment for a child running `shell`.
pub fn build_env(
    host: impl IntoIterator<Item = (String, String)>,
    shell: &str,
    strip: &[String],
    extra: &BTreeMap<String, String>,
) -> EnvSnapshot {
    let kind = ShellKind::of(shell);
    let mut env: EnvSnapshot = host
        .into_iter()
        .filter(|(key, _)| !strip.iter().any(|s| s == key))
        .filter(|(key, _)| !is_foreign_shell_var(key, kind))
        .collect();

    if !matches!(kind, ShellKind::Cmd | ShellKind::PowerShell) {
        env.insert("SHELL".into(), shell.to_string());
    }
    env.insert("TERM".into(), "xterm-256color".into());
    env.insert("COLORTERM".into(), "truecolor".into());

    for (key, value) in extra {
        env.insert(key.clone(), value.clone());
    }

    env
}

/// Startup-discovery variables owned by one shell family.
fn is_foreign_shell_var(key: &str, kind: ShellKind) -> bool {
    match key {
        "ZDOTDIR" => kind != ShellKind::Zsh,
        "BASH_ENV" => kind != ShellKind::Bash,
        "ENV" => !matches!(kind, ShellKind::Sh | ShellKind::Bash),
        "PSModulePath" => kind != ShellKind::PowerShell,
        _ => false,
    }
}
