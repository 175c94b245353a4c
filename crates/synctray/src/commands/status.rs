//! Status command: overview plus directory and device tables.

use std::fmt::Write as _;
use std::sync::Arc;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use synctray_core::{ConnectionSettings, Device, Directory, Overview};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::session;

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusReport {
    overview: Overview,
    directories: Vec<Arc<Directory>>,
    devices: Vec<Arc<Device>>,
}

#[derive(Tabled)]
struct DirectoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Need")]
    need: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_owned()
}

fn when(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn directory_row(dir: &Directory, color: bool) -> DirectoryRow {
    let progress = if dir.download.is_active() {
        dir.download.label.clone()
    } else if let Some(scan) = dir.scan {
        format!("scan {} %", scan.percentage)
    } else if (1..100).contains(&dir.completion_percentage) {
        format!("remote {} %", dir.completion_percentage)
    } else {
        String::new()
    };
    let status = if dir.errors.is_empty() {
        output::paint_directory(dir.status, color)
    } else {
        format!(
            "{} ({} errors)",
            output::paint_directory(dir.status, color),
            dir.errors.len()
        )
    };
    DirectoryRow {
        id: dir.id.clone(),
        label: dir.display_name().to_owned(),
        status,
        need: ByteSize::b(dir.counts.need_bytes).to_string_as(true),
        progress,
        path: dir.path.clone(),
    }
}

fn device_row(dev: &Device, color: bool) -> DeviceRow {
    let status = if dev.paused && dev.status != synctray_core::DeviceStatus::Paused {
        format!("{} (paused)", output::paint_device(dev.status, color))
    } else {
        output::paint_device(dev.status, color)
    };
    DeviceRow {
        id: short_id(&dev.id),
        name: dev.display_name().to_owned(),
        status,
        address: dev.connection.address.clone(),
        last_seen: if dev.is_own() {
            String::new()
        } else {
            when(dev.last_seen)
        },
    }
}

fn rate(kbit: f64) -> String {
    if kbit >= 1000.0 {
        format!("{:.1} Mbit/s", kbit / 1000.0)
    } else {
        format!("{kbit:.1} kbit/s")
    }
}

fn detail(report: &StatusReport, color: bool) -> String {
    let ov = &report.overview;
    let mut out = String::new();
    let _ = writeln!(out, "State:      {}", output::paint_state(ov.state, color));
    let _ = writeln!(out, "Device ID:  {}", ov.own_id);
    if !ov.config_dir.is_empty() {
        let _ = writeln!(out, "Config dir: {}", ov.config_dir);
    }
    let _ = writeln!(
        out,
        "Traffic:    in {} ({})  out {} ({})",
        ByteSize::b(ov.traffic.bytes_in).to_string_as(true),
        rate(ov.traffic.rate_in),
        ByteSize::b(ov.traffic.bytes_out).to_string_as(true),
        rate(ov.traffic.rate_out),
    );
    if let Some(ref last) = ov.last_file {
        let verb = if last.deleted { "deleted" } else { "updated" };
        let _ = writeln!(
            out,
            "Last file:  {}/{} {verb} {}",
            last.directory_id,
            last.name,
            when(Some(last.time))
        );
    }

    let dirs: Vec<DirectoryRow> = report
        .directories
        .iter()
        .map(|d| directory_row(d, color))
        .collect();
    let devs: Vec<DeviceRow> = report.devices.iter().map(|d| device_row(d, color)).collect();
    let _ = writeln!(out, "\nDirectories\n{}", output::render_table(&dirs));
    let _ = write!(out, "\nDevices\n{}", output::render_table(&devs));
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(settings: ConnectionSettings, global: &GlobalOpts) -> Result<(), CliError> {
    let (conn, _events) = session::open(settings, global).await?;
    let report = StatusReport {
        overview: conn.overview(),
        directories: conn.directories_snapshot().to_vec(),
        devices: conn.devices_snapshot().to_vec(),
    };
    conn.close().await;

    let color = output::should_color(global.color);
    let out = match global.output {
        OutputFormat::Plain => report.overview.state.to_string(),
        format => output::render_single(format, &report, |r| detail(r, color), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn short_id_keeps_first_group() {
        assert_eq!(short_id("ABCDEFG-HIJKLMN-OPQRSTU"), "ABCDEFG");
        assert_eq!(short_id("plain"), "plain");
    }

    #[test]
    fn rates_switch_to_mbit() {
        assert_eq!(rate(12.0), "12.0 kbit/s");
        assert_eq!(rate(2500.0), "2.5 Mbit/s");
    }

    #[test]
    fn directory_row_prefers_download_label() {
        let mut dir = Directory::placeholder("d1");
        dir.counts.need_bytes = 2048;
        dir.download.label = "1.0 MiB / 4.0 MiB - 25 %".into();
        dir.download.items.push(synctray_core::ItemProgress::default());
        let row = directory_row(&dir, false);
        assert_eq!(row.progress, "1.0 MiB / 4.0 MiB - 25 %");
        assert_eq!(row.need, "2.0 KiB");
    }
}
