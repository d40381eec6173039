use bytes::Bytes;

use scopelink_bridge::{bridge::endpoint_path, Direction};
use scopelink_frame::{Packet, PacketWriter, MAX_DATA_SIZE};
use scopelink_transport::Endpoint;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = build_payload(&args)?;
    if payload.len() > MAX_DATA_SIZE {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "payload is {} bytes, max {}",
                payload.len(),
                MAX_DATA_SIZE
            ),
        ));
    }

    let packet = Packet::new(args.command, args.packet_id, payload);
    let path = endpoint_path(&args.base_path, &args.name, Direction::Rx);

    let stream = Endpoint::connect(&path).map_err(|err| transport_error("connect failed", err))?;
    let mut writer = PacketWriter::new(stream);
    writer
        .write_packet(&packet)
        .map_err(|err| frame_error("send failed", err))?;

    print_packet(&packet, "RX", format);
    Ok(SUCCESS)
}

fn build_payload(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(data) = &args.data {
        return Ok(Bytes::from(data.clone().into_bytes()));
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex).map(Bytes::from);
    }
    Ok(Bytes::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 {
        return Err(CliError::new(
            DATA_INVALID,
            "hex payload must have an even number of digits",
        ));
    }
    (0..compact.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&compact[i..i + 2], 16).map_err(|_| {
                CliError::new(
                    DATA_INVALID,
                    format!("invalid hex byte '{}'", &compact[i..i + 2]),
                )
            })
        })
        .collect()
}
