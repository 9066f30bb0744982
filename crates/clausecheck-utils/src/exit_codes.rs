//! Exit code constants for clausecheck.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Review completed (degraded runs too, unless `--strict`) |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `PARSE_FAILURE` | Document could not be structured |
//! | 4 | `SCHEMA_FAILURE` | Model reply failed the schema check after the retry |
//! | 5 | `DEGRADED` | Some chunks failed and `--strict` was given |
//! | 10 | `CALL_TIMEOUT` | A gateway call timed out |
//! | 70 | `UPSTREAM_FAILURE` | LLM provider failure |
//! | 130 | `CANCELLED` | Run cancelled (Ctrl-C) |

/// Exit codes matching the documented exit code table.
///
/// Use the named constants, or [`as_i32()`](Self::as_i32) to get the numeric
/// value for `std::process::exit()`.
///
/// ```rust
/// use clausecheck_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::SCHEMA_FAILURE, ExitCode::from_i32(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - review completed
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Parse failure - the document is empty or hints are invalid
    pub const PARSE_FAILURE: ExitCode = ExitCode(3);

    /// Schema failure - model output unusable after the bounded retry
    pub const SCHEMA_FAILURE: ExitCode = ExitCode(4);

    /// Degraded - report written but some sections were not analyzed
    pub const DEGRADED: ExitCode = ExitCode(5);

    /// Call timeout - a gateway call exceeded its timeout
    pub const CALL_TIMEOUT: ExitCode = ExitCode(10);

    /// Upstream failure - provider auth, quota, outage or transport
    pub const UPSTREAM_FAILURE: ExitCode = ExitCode(70);

    /// Cancelled - interrupted by the user
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Values outside u8 never occur; the table above is the full set.
        std::process::ExitCode::from(u8::try_from(code.0).unwrap_or(1))
    }
}
