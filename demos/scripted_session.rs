// Scripted session example
//
// This example runs a complete instrument session against the scripted mock
// transport. It needs no hardware and shows every frame that would have
// gone out on the wire.

use labwire::{Communicator, MockTransport, ScpiClient, ScpiSubset};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    println!("Scripted Instrument Session");
    println!("===========================\n");

    // 1. Script the instrument side of the conversation
    println!("1. Scripting instrument responses...");
    let mut mock = MockTransport::new();
    let journal = mock.journal();
    mock.push_response(b"Keithley Instruments Inc.,3390,1234,1.00\n".to_vec());
    mock.push_response(b"33\n".to_vec());
    mock.push_response(b"1\n".to_vec());

    // 2. Open the session
    println!("2. Opening the session...");
    let mut com = Communicator::new(Box::new(mock));
    com.open()?;
    let mut scpi = ScpiClient::new(com, ScpiSubset::All)?;

    // 3. Identify the instrument
    println!("3. Instrument: {}", scpi.identify()?);

    // 4. Drive the status subsystem
    println!("4. Driving the status subsystem...");
    scpi.call("clear_status")?;
    scpi.set_event_status_enable(&[0x01, 0x20])?;
    println!("   enabled flags: {:?}", scpi.enabled_event_flags()?);
    println!("   event flags:   {:?}", scpi.standard_event_flags()?);

    // 5. Show what went out on the wire
    println!("\n5. Frames sent on the wire:");
    for line in journal.lines() {
        println!("   {line}");
    }

    Ok(())
}
