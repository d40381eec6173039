use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scopelink_bridge::{Bridge, BridgeConfig, Packet, PacketSink};

use crate::cmd::RunArgs;
use crate::exit::{bridge_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

/// Sink that prints every packet the host application sends us.
struct PrintSink {
    format: OutputFormat,
}

impl PacketSink for PrintSink {
    fn deliver(&self, packet: Packet) {
        print_packet(&packet, "RX", self.format);
    }
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = BridgeConfig {
        base_path: args.base_path,
        ..BridgeConfig::default()
    };
    let mut bridge = Bridge::with_config(args.name.as_str(), Arc::new(PrintSink { format }), config);

    bridge
        .start()
        .map_err(|err| bridge_error("bridge start failed", err))?;
    eprintln!(
        "bridge '{}' up: tx={} rx={}",
        args.name,
        bridge.tx_path().display(),
        bridge.rx_path().display()
    );

    if args.test_packet {
        bridge.enqueue(Packet::new(1, 0x0808, vec![1, 2, 3, 4, 5]));
        eprintln!("self-test packet queued");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    bridge.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
