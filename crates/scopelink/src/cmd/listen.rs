use scopelink_bridge::{bridge::endpoint_path, Direction};
use scopelink_frame::{FrameError, PacketReader};
use scopelink_transport::Endpoint;

use crate::cmd::ListenArgs;
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let path = endpoint_path(&args.base_path, &args.name, Direction::Tx);
    let stream = Endpoint::connect(&path).map_err(|err| transport_error("connect failed", err))?;
    let mut reader = PacketReader::new(stream);

    let mut printed = 0usize;
    loop {
        let packet = match reader.read_packet() {
            Ok(packet) => packet,
            Err(FrameError::ConnectionClosed) => return Ok(SUCCESS),
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        print_packet(&packet, "TX", format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }
}
