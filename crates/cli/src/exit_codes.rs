//! CLI Exit Code Registry
//!
//! Single source of truth for `refsync` exit codes. Scripts and schedulers
//! rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success (run committed, dry run finished, command done)   |
//! | 1    | General error                                             |
//! | 2    | Usage error (bad arguments; clap exits with 2 as well)    |
//! | 3    | Input error (file unreadable, malformed, missing column)  |
//! | 4    | Database error; the run was rolled back                   |
//! | 5    | Configuration error (bad config file, no database given)  |

use refsync_recon::SyncError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input file unreadable, not valid CSV, or missing a required column.
pub const EXIT_INPUT: u8 = 3;

/// Database failure. Nothing from the run was committed.
pub const EXIT_PERSISTENCE: u8 = 4;

/// Config file unreadable or invalid, or no database configured.
pub const EXIT_CONFIG: u8 = 5;

/// Map a reconciliation error to its exit code.
pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err {
        SyncError::Input(_) | SyncError::MissingColumn { .. } => EXIT_INPUT,
        SyncError::Persistence(_) => EXIT_PERSISTENCE,
    }
}
