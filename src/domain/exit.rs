//! Process exit statuses.

/// Successful run.
pub const EXIT_OK: i32 = 0;
/// Fatal provisioning or runtime error.
pub const EXIT_FAILURE: i32 = 1;
/// Invalid flag combination (matches clap's own usage status).
pub const EXIT_USAGE: i32 = 2;
/// At least one release failed; manual cleanup may be needed.
pub const EXIT_CLEANUP_INCOMPLETE: i32 = 3;
/// Terminated by an operator signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// How the provisioning run ended, before teardown is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    Interrupted,
}

/// Map a run outcome and the teardown result to a process exit status.
///
/// A failed release always wins: operators must learn about leaked resources
/// even when the run itself was interrupted or failed.
#[must_use]
pub fn exit_code(outcome: RunOutcome, cleanup_complete: bool) -> i32 {
    if !cleanup_complete {
        return EXIT_CLEANUP_INCOMPLETE;
    }
    match outcome {
        RunOutcome::Completed => EXIT_OK,
        RunOutcome::Failed => EXIT_FAILURE,
        RunOutcome::Interrupted => EXIT_INTERRUPTED,
    }
}
