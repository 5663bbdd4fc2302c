// Correlator configuration example
//
// This example programs an OCTAD-S style GPU correlator over its command
// socket: demultiplexer calibration, requantization scaling and the
// integration period, with every argument validated before it leaves the
// host. The correlator frames its protocol with ';' instead of a newline.

use clap::Parser;
use labwire::{
    CommandGuard, Communicator, ResponseMode, SocketConfig, SocketTransport, ValidationRule,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "correlator_setup")]
#[command(version = "1.0")]
#[command(about = "Configure a correlator over its command socket")]
#[command(
    long_about = "Calibrate the demultiplexers of an OCTAD-S style correlator, then program the requantization scaling and the integration period length."
)]
struct Args {
    /// Correlator host name or address
    host: String,

    /// Command port
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// ADC stream to scale: 1, 2, or 5 for both
    #[arg(short = 'n', long, default_value_t = 5)]
    stream: i64,

    /// Requantization scale factor
    #[arg(short, long, default_value_t = 15)]
    scale: i64,

    /// Integration period length in units of 2^24 samples
    #[arg(short, long, default_value_t = 10)]
    iplen: i64,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    println!("Correlator Setup");
    println!("================");
    println!("Correlator: {}:{}", args.host, args.port);
    println!("Stream: {}", args.stream);
    println!("Scale: {}", args.scale);
    println!("Integration period: {}\n", args.iplen);

    let scaling = CommandGuard::new("set_scaling")
        .param("n")
        .param("scale")
        .rule(ValidationRule::choice("n", [1, 2, 5]))
        .rule(ValidationRule::range_clamped("scale", 0.0, 31.0));

    let iplen = CommandGuard::new("set_iplen")
        .param("len")
        .rule(ValidationRule::choice("len", [5, 10]));

    let config =
        SocketConfig::new(args.host.clone(), args.port).with_timeout(Duration::from_secs(2));
    let mut com =
        Communicator::new(Box::new(SocketTransport::new(config))).with_mode(ResponseMode::Lines);
    com.on_open(|link| {
        link.set_terminator(";");
        Ok(())
    });
    com.open()?;
    println!("✓ Connected to {}:{}", args.host, args.port);

    // Calibrate both demultiplexer boards before touching the data path.
    for n in [1, 2] {
        com.send(&format!("ctl_dmxcal{n}"))?;
    }
    println!("✓ Demultiplexers calibrated");

    let bound = scaling.check(&[args.stream.into(), args.scale.into()], &[])?;
    com.send(&format!("set_scaling{}={}", bound["n"], bound["scale"]))?;
    println!("✓ Scaling programmed");

    let bound = iplen.check(&[args.iplen.into()], &[])?;
    com.send(&format!("set_iplen={}", bound["len"]))?;
    com.send("set_ipreq=on")?;
    println!("✓ Integration period programmed");

    Ok(())
}
