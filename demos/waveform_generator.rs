// Socket-attached waveform generator example
//
// This example drives a Keithley 3390 class arbitrary waveform generator
// over its LAN socket: identify, reset, program a sine output with
// validated parameters and read the instrument error queue back.

use clap::Parser;
use labwire::{
    decode, CommandGuard, Communicator, ScpiClient, ScpiSubset, SocketConfig, SocketTransport,
    ValidationRule, Value,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "waveform_generator")]
#[command(version = "1.0")]
#[command(about = "Program a socket-attached waveform generator")]
#[command(
    long_about = "Connect to an IEEE-488.2 instrument over a stream socket, program a sine waveform with validated parameters and verify the instrument error queue afterwards."
)]
struct Args {
    /// Instrument host name or address
    host: String,

    /// Instrument command port
    #[arg(short, long, default_value_t = 5025)]
    port: u16,

    /// Output frequency in Hz
    #[arg(short, long, default_value_t = 1000.0)]
    frequency: f64,

    /// Peak-to-peak amplitude in volts
    #[arg(short, long, default_value_t = 0.1)]
    amplitude: f64,

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

    println!("Waveform Generator Control");
    println!("==========================");
    println!("Instrument: {}:{}", args.host, args.port);
    println!("Frequency: {} Hz", args.frequency);
    println!("Amplitude: {} Vpp\n", args.amplitude);

    // Sine output limits of the 3390: frequency is a hard bound, the
    // amplitude is clamped into the supported span.
    let apply = CommandGuard::new("apply_sine")
        .param("frequency")
        .param_default("amplitude", 0.1)
        .rule(ValidationRule::range("frequency", 1e-6, 50e6))
        .rule(ValidationRule::range_clamped("amplitude", 0.01, 10.0));

    let checked = apply.check(
        &[Value::Float(args.frequency)],
        &[("amplitude", Value::Float(args.amplitude))],
    )?;

    let config =
        SocketConfig::new(args.host.clone(), args.port).with_timeout(Duration::from_secs(2));
    let mut com = Communicator::new(Box::new(SocketTransport::new(config)));
    com.open()?;
    println!("✓ Connected to {}:{}", args.host, args.port);

    let mut scpi = ScpiClient::new(com, ScpiSubset::All)?;
    println!("✓ Instrument: {}", scpi.identify()?);

    scpi.call("reset")?;
    scpi.call("clear_status")?;

    let com = scpi.communicator_mut();
    com.send(&format!(
        "APPL:SIN {},{}",
        checked["frequency"], checked["amplitude"]
    ))?;
    com.send("OUTP ON")?;
    println!("✓ Sine output programmed");

    let reply = decode(com.query("SYST:ERR?")?)?;
    let status = reply.first_line().trim().to_string();
    if status.starts_with("+0") {
        println!("✓ Instrument reports no errors");
    } else {
        eprintln!("Instrument error: {status}");
        std::process::exit(1);
    }

    Ok(())
}
