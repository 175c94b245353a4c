//! QR code command: fetch a PNG from the daemon.

use std::io::Write;

use synctray_core::ConnectionSettings;

use crate::cli::{GlobalOpts, QrArgs};
use crate::error::CliError;

use super::session;

pub async fn handle(
    args: QrArgs,
    settings: ConnectionSettings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.text.is_empty() {
        return Err(CliError::Validation {
            field: "text".into(),
            reason: "nothing to encode".into(),
        });
    }

    let (conn, _events) = session::open(settings, global).await?;
    let png = conn.request_qr_code(args.text).await;
    conn.close().await;
    let png = png?;

    match args.out {
        Some(path) => {
            std::fs::write(&path, &png)?;
            tracing::info!(path = %path.display(), bytes = png.len(), "wrote QR code");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&png)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
