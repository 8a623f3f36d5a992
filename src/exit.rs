//! Thread and process exit codes.
//!
//! Every thread body returns an [`ExitCode`]. The trampoline substitutes
//! [`ExitCode::RUNTIME_ERROR`] when the body fails, and the primary thread's
//! code becomes the process exit status.

use std::fmt;

/// Exit code reported by a finished thread.
///
/// Any `u32` is a valid code. The named constants occupy the `114..=128`
/// band so they do not collide with small application-defined values.
///
/// # Example
/// ```ignore
/// let code = ExitCode(7);
/// assert!(!code.is_named());
/// assert_eq!(ExitCode::RUNTIME_ERROR.to_string(), "RuntimeError");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExitCode(pub u32);

impl ExitCode {
    pub const NORMAL: Self = Self(0);
    pub const DESCHEDULE: Self = Self(114);
    pub const ADMIN_STOP: Self = Self(115);
    pub const CONFIG_ERROR: Self = Self(116);
    pub const INTERNAL_ERROR: Self = Self(117);
    pub const ADMIN_RESTART: Self = Self(118);
    pub const FATAL_ERROR: Self = Self(119);
    pub const RUNTIME_ERROR: Self = Self(120);
    pub const SYSTEM_EXCEPTION: Self = Self(121);
    pub const BAD_PARAMETERS: Self = Self(122);
    pub const RESOURCE_ACCESS: Self = Self(123);
    pub const PERMISSION_LEVEL: Self = Self(124);
    pub const NOT_FOUND: Self = Self(125);
    pub const INIT_FAILED: Self = Self(126);
    pub const BAD_ENVIRONMENT: Self = Self(127);
    pub const UNKNOWN: Self = Self(128);

    /// Returns the symbolic name of a well-known code.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::NORMAL => "Normal",
            Self::DESCHEDULE => "Deschedule",
            Self::ADMIN_STOP => "AdminStop",
            Self::CONFIG_ERROR => "ConfigError",
            Self::INTERNAL_ERROR => "InternalError",
            Self::ADMIN_RESTART => "AdminRestart",
            Self::FATAL_ERROR => "FatalError",
            Self::RUNTIME_ERROR => "RuntimeError",
            Self::SYSTEM_EXCEPTION => "SystemException",
            Self::BAD_PARAMETERS => "BadParameters",
            Self::RESOURCE_ACCESS => "ResourceAccess",
            Self::PERMISSION_LEVEL => "PermissionLevel",
            Self::NOT_FOUND => "NotFound",
            Self::INIT_FAILED => "InitFailed",
            Self::BAD_ENVIRONMENT => "BadEnvironment",
            Self::UNKNOWN => "Unknown",
            _ => return None,
        };

        Some(name)
    }

    /// Returns true if this is one of the named constants.
    pub fn is_named(self) -> bool {
        self.name().is_some()
    }

    /// Ends the process with this code after flushing the logger.
    pub fn exit_process(self) -> ! {
        log::logger().flush();
        std::process::exit(self.0 as i32)
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u32> for ExitCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0 as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Last-resort termination for consistency failures.
///
/// Writes straight to stderr: this runs on paths where the logger may
/// itself need the thread registry.
pub(crate) fn fatal(message: &str) -> ! {
    eprintln!("threadcore: fatal: {}", message);
    std::process::exit(ExitCode::FATAL_ERROR.0 as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_codes_display_by_name() {
        assert_eq!(ExitCode::NORMAL.to_string(), "Normal");
        assert_eq!(ExitCode::ADMIN_STOP.to_string(), "AdminStop");
        assert_eq!(ExitCode(7).to_string(), "7");
    }

    #[test]
    fn test_named_band() {
        assert!(ExitCode::UNKNOWN.is_named());
        assert!(!ExitCode(113).is_named());
        assert_eq!(i32::from(ExitCode::RUNTIME_ERROR), 120);
    }
}
