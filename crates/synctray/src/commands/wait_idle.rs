//! Block until the daemon reports every directory idle.

use std::time::Duration;

use synctray_core::{ConnectionSettings, ConnectionState};

use crate::cli::{GlobalOpts, WaitIdleArgs};
use crate::error::CliError;
use crate::output;

use super::session;

pub async fn handle(
    args: &WaitIdleArgs,
    settings: ConnectionSettings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let url = settings
        .url
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let limit: Duration = *args.timeout;
    let (conn, _events) = session::open(settings, global).await?;
    let mut state = conn.state_watch();

    let settled = tokio::time::timeout(
        limit,
        state.wait_for(|s| {
            matches!(
                s,
                ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::ShuttingDown
            )
        }),
    )
    .await;
    let outcome = match settled {
        Ok(Ok(s)) => *s,
        Ok(Err(_)) => ConnectionState::ShuttingDown,
        Err(_) => {
            conn.close().await;
            return Err(CliError::Timeout {
                seconds: limit.as_secs(),
            });
        }
    };
    conn.close().await;

    if outcome == ConnectionState::Idle {
        output::print_output("All directories idle", global.quiet);
        Ok(())
    } else {
        Err(CliError::ConnectionFailed {
            url,
            message: format!("connection ended while waiting ({outcome})"),
        })
    }
}
