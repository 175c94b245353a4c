//! Log command handler.

use tabled::Tabled;

use synctray_core::{ConnectionSettings, LogEntry};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::session;

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn log_row(entry: &LogEntry) -> LogRow {
    LogRow {
        when: entry.when.clone(),
        message: entry.message.clone(),
    }
}

pub async fn handle(settings: ConnectionSettings, global: &GlobalOpts) -> Result<(), CliError> {
    let (conn, _events) = session::open(settings, global).await?;
    let entries = conn.request_log().await;
    conn.close().await;
    let entries = entries?;

    let out = output::render_list(global.output, &entries, log_row, |e| {
        format!("{} {}", e.when, e.message)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
