use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use scopelink_frame::Packet;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    command: u16,
    packet_id: u16,
    data_size: usize,
    data_hex: String,
    channel: &'a str,
    timestamp: String,
}

pub fn print_packet(packet: &Packet, channel: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                command: packet.command,
                packet_id: packet.packet_id,
                data_size: packet.data_size(),
                data_hex: hex_preview(packet.data.as_ref()),
                channel,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "PACKET ID", "SIZE", "CHANNEL", "DATA"])
                .add_row(vec![
                    packet.command.to_string(),
                    format!("0x{:04X}", packet.packet_id),
                    packet.data_size().to_string(),
                    channel.to_string(),
                    hex_preview(packet.data.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "command={} packet_id=0x{:04X} size={} channel={} data={}",
                packet.command,
                packet.packet_id,
                packet.data_size(),
                channel,
                hex_preview(packet.data.as_ref())
            );
        }
    }
}

const HEX_PREVIEW_LIMIT: usize = 64;

fn hex_preview(data: &[u8]) -> String {
    let shown = &data[..data.len().min(HEX_PREVIEW_LIMIT)];
    let mut out = shown
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > HEX_PREVIEW_LIMIT {
        out.push_str(&format!(" ... ({} bytes)", data.len()));
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_preview_formats_bytes() {
        assert_eq!(hex_preview(&[0x01, 0xAB]), "01 AB");
    }

    #[test]
    fn hex_preview_truncates_long_payloads() {
        let data = vec![0u8; 100];
        let preview = hex_preview(&data);
        assert!(preview.ends_with("(100 bytes)"));
    }
}
