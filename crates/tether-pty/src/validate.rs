//! Validation of untrusted spawn inputs.
//!
//! Callers are expected to validate before asking for a spawn; these checks
//! run again right before a command line is built.

use crate::error::SpawnError;

/// Characters never accepted in a command string.
pub const FORBIDDEN_COMMAND_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>', '!', '#', '*', '?', '\n',
    '\r', '\\', '\'', '"',
];

const MAX_COMMAND_LEN: usize = 4096;
const MAX_IDENT_LEN: usize = 128;

/// Reject a command containing shell metacharacters.
pub fn validate_command(command: &str) -> Result<(), SpawnError> {
    if command.len() > MAX_COMMAND_LEN {
        return Err(SpawnError::UnsafeInput(format!(
            "command too long ({} bytes, max {MAX_COMMAND_LEN})",
            command.len()
        )));
    }
    if let Some(c) = command
        .chars()
        .find(|c| FORBIDDEN_COMMAND_CHARS.contains(c) || (c.is_control() && *c != '\t'))
    {
        return Err(SpawnError::UnsafeInput(format!(
            "command contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

/// Resume ids: `[a-zA-Z0-9_-]+`.
pub fn validate_resume_id(id: &str) -> Result<(), SpawnError> {
    validate_ident("resume id", id, |c| c == '_' || c == '-')
}

/// Model names: `[a-zA-Z0-9._:-]+`.
pub fn validate_model(model: &str) -> Result<(), SpawnError> {
    validate_ident("model", model, |c| matches!(c, '.' | '_' | ':' | '-'))
}

/// Whether `id` would pass [`validate_resume_id`].
pub fn is_valid_resume_id(id: &str) -> bool {
    validate_resume_id(id).is_ok()
}

fn validate_ident(
    what: &str,
    value: &str,
    extra: impl Fn(char) -> bool,
) -> Result<(), SpawnError> {
    if value.is_empty() {
        return Err(SpawnError::UnsafeInput(format!("{what} must not be empty")));
    }
    if value.len() > MAX_IDENT_LEN {
        return Err(SpawnError::UnsafeInput(format!(
            "{what} too long ({} chars, max {MAX_IDENT_LEN})",
            value.len()
        )));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || extra(c)) {
        return Err(SpawnError::UnsafeInput(format!(
            "{what} contains invalid characters"
        )));
    }
    Ok(())
}
