use crate::commands::{run_with_session, CommandResult, Outcome};

/// Pending migrations are applied while the session opens.
pub fn run() -> CommandResult {
    run_with_session("migrate", |_session| async { Ok(Outcome::message("applied pending migrations")) })
}
