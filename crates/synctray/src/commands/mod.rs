//! Command dispatch: bridges CLI args -> engine commands -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod log;
pub mod qr;
pub mod session;
pub mod status;
pub mod wait_idle;
pub mod watch;

use synctray_core::ConnectionSettings;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use control::Target;

/// Dispatch a daemon-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    settings: ConnectionSettings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(settings, global).await,
        Command::Log => log::handle(settings, global).await,
        Command::Rescan(args) => control::handle(Target::Directory, args, settings, global).await,
        Command::Pause(args) => control::handle(Target::Pause, args, settings, global).await,
        Command::Resume(args) => control::handle(Target::Resume, args, settings, global).await,
        Command::Restart => control::restart(settings, global).await,
        Command::Shutdown => control::shutdown(settings, global).await,
        Command::WaitIdle(args) => wait_idle::handle(&args, settings, global).await,
        Command::Watch => watch::handle(settings, global).await,
        Command::Qr(args) => qr::handle(args, settings, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
