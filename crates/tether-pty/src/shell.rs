//! Shell resolution and argument framing.
//!
//! Only shells on a fixed allow-list of absolute paths may be requested.
//! An unknown or missing shell falls back to the host default instead of
//! failing the spawn.

use std::path::Path;

/// Absolute shell paths a caller may request.
#[cfg(unix)]
pub const ALLOWED_SHELLS: &[&str] = &[
    "/bin/bash",
    "/bin/zsh",
    "/bin/sh",
    "/bin/dash",
    "/bin/fish",
    "/usr/bin/bash",
    "/usr/bin/zsh",
    "/usr/bin/sh",
    "/usr/bin/dash",
    "/usr/bin/fish",
    "/usr/local/bin/bash",
    "/usr/local/bin/zsh",
    "/usr/local/bin/fish",
    "/opt/homebrew/bin/bash",
    "/opt/homebrew/bin/zsh",
    "/opt/homebrew/bin/fish",
];

/// Absolute shell paths a caller may request.
#[cfg(windows)]
pub const ALLOWED_SHELLS: &[&str] = &[
    r"C:\Windows\System32\cmd.exe",
    r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe",
    r"C:\Program Files\PowerShell\7\pwsh.exe",
];

#[cfg(unix)]
const FALLBACK_SHELLS: &[&str] = &["/bin/bash", "/bin/zsh", "/bin/sh"];

#[cfg(windows)]
const FALLBACK_SHELLS: &[&str] = &[r"C:\Windows\System32\cmd.exe"];

/// Shell family, derived from the binary name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Zsh,
    Fish,
    Sh,
    Cmd,
    PowerShell,
    Other,
}

impl ShellKind {
    pub fn of(shell: &str) -> Self {
        let name = shell
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(shell)
            .to_ascii_lowercase();
        let name = name.strip_suffix(".exe").unwrap_or(&name);
        match name {
            "bash" => ShellKind::Bash,
            "zsh" => ShellKind::Zsh,
            "fish" => ShellKind::Fish,
            "sh" | "dash" => ShellKind::Sh,
            "cmd" => ShellKind::Cmd,
            "powershell" | "pwsh" => ShellKind::PowerShell,
            _ => ShellKind::Other,
        }
    }
}

/// Resolve the shell to launch for an optional caller preference.
pub fn resolve_shell(requested: Option<&str>) -> String {
    let env_shell = host_shell_var();
    resolve_shell_with(requested, env_shell.as_deref(), |p| Path::new(p).is_file())
}

/// Resolution with the environment and file-system probes injected.
pub fn resolve_shell_with(
    requested: Option<&str>,
    env_shell: Option<&str>,
    exists: impl Fn(&str) -> bool,
) -> String {
    if let Some(requested) = requested.filter(|s| !s.is_empty()) {
        if ALLOWED_SHELLS.contains(&requested) && exists(requested) {
            return requested.to_string();
        }
        tracing::warn!(
            shell = requested,
            "Requested shell is not allowed or not installed, using default"
        );
    }

    if let Some(shell) = env_shell.filter(|s| ALLOWED_SHELLS.contains(s) && exists(s)) {
        return shell.to_string();
    }

    FALLBACK_SHELLS
        .iter()
        .find(|s| exists(s))
        .unwrap_or(&FALLBACK_SHELLS[FALLBACK_SHELLS.len() - 1])
        .to_string()
}

#[cfg(unix)]
fn host_shell_var() -> Option<String> {
    std::env::var("SHELL").ok()
}

#[cfg(windows)]
fn host_shell_var() -> Option<String> {
    std::env::var("COMSPEC").ok()
}

/// Arguments that start `shell` as an interactive login shell.
pub fn login_args(shell: &str) -> Vec<String> {
    match ShellKind::of(shell) {
        ShellKind::Cmd => vec![],
        ShellKind::PowerShell => vec!["-NoLogo".into()],
        _ => vec!["-l".into()],
    }
}

/// Directive run after the primary command so the PTY drops into a shell
/// instead of closing. `None` where the shell keeps itself alive (`/K`,
/// `-NoExit`).
pub fn post_command_directive(shell: &str) -> Option<String> {
    match ShellKind::of(shell) {
        ShellKind::Cmd | ShellKind::PowerShell => None,
        _ => Some(format!("exec '{shell}' -l")),
    }
}

/// Build the full argument vector for `shell`.
///
/// With a command, Unix shells run
/// `trap true INT; <command>; exec '<shell>' -l`: an interrupt ends the
/// command but not the wrapper, which then replaces itself with a login
/// shell whether the command succeeded, failed or was interrupted.
pub fn shell_args(shell: &str, command: Option<&str>) -> Vec<String> {
    let Some(command) = command.filter(|c| !c.trim().is_empty()) else {
        return login_args(shell);
    };

    match ShellKind::of(shell) {
        ShellKind::Cmd => vec!["/K".into(), command.to_string()],
        ShellKind::PowerShell => vec![
            "-NoLogo".into(),
            "-NoExit".into(),
            "-Command".into(),
            command.to_string(),
        ],
        _ => {
            let mut script = format!("trap true INT; {command}");
            if let Some(directive) = post_command_directive(shell) {
                script.push_str("; ");
                script.push_str(&directive);
            }
            vec!["-l".into(), "-c".into(), script]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_kind_detection() {
        assert_eq!(ShellKind::of("/bin/bash"), ShellKind::Bash);
        assert_eq!(ShellKind::of("/opt/homebrew/bin/zsh"), ShellKind::Zsh);
        assert_eq!(ShellKind::of("/usr/bin/fish"), ShellKind::Fish);
        assert_eq!(ShellKind::of("/bin/dash"), ShellKind::Sh);
        assert_eq!(ShellKind::of(r"C:\Windows\System32\cmd.exe"), ShellKind::Cmd);
        assert_eq!(ShellKind::of(r"C:\Program Files\PowerShell\7\pwsh.exe"), ShellKind::PowerShell);
        assert_eq!(ShellKind::of("/usr/local/bin/nu"), ShellKind::Other);
    }

    #[test]
    fn login_args_per_family() {
        assert_eq!(login_args("/bin/zsh"), vec!["-l".to_string()]);
        assert_eq!(login_args("/usr/bin/fish"), vec!["-l".to_string()]);
        assert!(login_args(r"C:\Windows\System32\cmd.exe").is_empty());
        assert_eq!(login_args("powershell.exe"), vec!["-NoLogo".to_string()]);
    }

    #[test]
    fn command_is_wrapped_with_trap_and_exec() {
        let args = shell_args("/bin/bash", Some("claude --model opus"));
        assert_eq!(args[0], "-l");
        assert_eq!(args[1], "-c");
        assert_eq!(
            args[2],
            "trap true INT; claude --model opus; exec '/bin/bash' -l"
        );
    }

    #[test]
    fn blank_command_means_bare_login_shell() {
        assert_eq!(shell_args("/bin/zsh", None), vec!["-l".to_string()]);
        assert_eq!(shell_args("/bin/zsh", Some("   ")), vec!["-l".to_string()]);
    }

    #[test]
    fn windows_shells_keep_themselves_alive() {
        assert_eq!(
            shell_args(r"C:\Windows\System32\cmd.exe", Some("dir")),
            vec!["/K".to_string(), "dir".to_string()]
        );
        let ps = shell_args("pwsh.exe", Some("Get-Date"));
        assert!(ps.contains(&"-NoExit".to_string()));
        assert_eq!(ps.last().unwrap(), "Get-Date");
        assert!(post_command_directive("cmd.exe").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn allowed_request_is_honoured() {
        let shell = resolve_shell_with(Some("/bin/zsh"), Some("/bin/bash"), |_| true);
        assert_eq!(shell, "/bin/zsh");
    }

    #[cfg(unix)]
    #[test]
    fn unknown_request_falls_back_to_env_shell() {
        let shell = resolve_shell_with(Some("/tmp/evil-shell"), Some("/bin/zsh"), |_| true);
        assert_eq!(shell, "/bin/zsh");
    }

    #[cfg(unix)]
    #[test]
    fn uninstalled_request_falls_back() {
        let shell = resolve_shell_with(Some("/usr/bin/fish"), None, |p| p == "/bin/sh");
        assert_eq!(shell, "/bin/sh");
    }

    #[cfg(unix)]
    #[test]
    fn disallowed_env_shell_is_ignored() {
        let shell = resolve_shell_with(None, Some("/home/me/bin/xonsh"), |p| p == "/bin/bash");
        assert_eq!(shell, "/bin/bash");
    }

    #[cfg(unix)]
    #[test]
    fn nothing_installed_still_yields_a_path() {
        let shell = resolve_shell_with(None, None, |_| false);
        assert_eq!(shell, "/bin/sh");
    }

    #[test]
    fn resolve_shell_returns_nonempty() {
        assert!(!resolve_shell(None).is_empty());
    }
}
