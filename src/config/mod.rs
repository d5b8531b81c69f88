//! Parser and protocol limits
//!
//! Every bound the shell enforces lives here as a named constant, and is
//! carried around in a [`Limits`] value so tests and deployments can tighten
//! or relax it without touching the parser.
//!
//! Environment overrides (read only by the binaries):
//! - RDSH_MAX_COMMANDS (pipeline length)
//! - RDSH_MAX_REQUEST (request buffer size in bytes)

use std::env;

/// Maximum number of commands in one pipeline
pub const MAX_COMMANDS: usize = 8;

/// Maximum length of a program name
pub const MAX_PROGRAM_LEN: usize = 64;

/// Maximum length of a single argument
pub const MAX_ARG_LEN: usize = 256;

/// Maximum number of arguments after the program name
pub const MAX_ARGS: usize = 8;

/// Maximum size of one request on the wire, terminator included
pub const MAX_REQUEST_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_commands: usize,
    pub max_program_len: usize,
    pub max_arg_len: usize,
    pub max_args: usize,
    pub max_request_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_commands: MAX_COMMANDS,
            max_program_len: MAX_PROGRAM_LEN,
            max_arg_len: MAX_ARG_LEN,
            max_args: MAX_ARGS,
            max_request_len: MAX_REQUEST_LEN,
        }
    }
}

impl Limits {
    /// Defaults with `RDSH_*` environment overrides applied.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_commands: env_usize("RDSH_MAX_COMMANDS", defaults.max_commands),
            max_request_len: env_usize("RDSH_MAX_REQUEST", defaults.max_request_len),
            ..defaults
        }
    }

    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.max_commands = max_commands;
        self
    }
}

/// Reads a positive integer from the environment, falling back to `default`
/// when the variable is unset, unparsable, or zero.
pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let limits = Limits::default();
        assert_eq!(limits.max_commands, 8);
        assert_eq!(limits.max_program_len, 64);
        assert_eq!(limits.max_arg_len, 256);
        assert_eq!(limits.max_request_len, 65536);
    }

    #[test]
    fn test_env_usize_fallbacks() {
        assert_eq!(env_usize("RDSH_TEST_UNSET_VARIABLE_XYZ", 7), 7);

        env::set_var("RDSH_TEST_ENV_USIZE_BAD", "lots");
        assert_eq!(env_usize("RDSH_TEST_ENV_USIZE_BAD", 3), 3);

        env::set_var("RDSH_TEST_ENV_USIZE_ZERO", "0");
        assert_eq!(env_usize("RDSH_TEST_ENV_USIZE_ZERO", 3), 3);

        env::set_var("RDSH_TEST_ENV_USIZE_OK", " 12 ");
        assert_eq!(env_usize("RDSH_TEST_ENV_USIZE_OK", 3), 12);
    }
}
