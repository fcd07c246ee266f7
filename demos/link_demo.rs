//! Link driver demonstration
//!
//! Runs a scripted session against the mock transport. Pass a JSON config
//! file to also query a real module on the configured serial port:
//!
//! ```text
//! cargo run --example link_demo -- pmodble.json
//! ```

use pmodble::{
    init_logging, BleConfig, BleError, BleLink, DeviceAddress, DriverConfig, LogSettings,
    MockTransport,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Some(BleConfig::from_file(path)?),
        None => None,
    };
    let log_settings = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(LogSettings::default);
    init_logging(&log_settings)?;

    println!("=== PmodBLE Link Demo ===\n");

    demo_scripted_session()?;
    demo_failures()?;

    if let Some(config) = config {
        demo_serial_module(&config)?;
    }

    println!("Link demo completed successfully!");
    Ok(())
}

fn scripted_link(mock: MockTransport) -> BleLink<MockTransport> {
    BleLink::new(mock, DriverConfig::mock())
}

fn demo_scripted_session() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Scripted Session ---");

    let peer: DeviceAddress = "001EC0AABBCC".parse()?;
    let connect = format!("C,0,{}\r", peer);

    let mut mock = MockTransport::new();
    mock.expect_enter().expect("A\r", "AOK").expect_exit();
    mock.expect_enter()
        .expect("D\r", "BTA=801F12B4C2D1\r\nName=PmodBLE\r\n")
        .expect_exit();
    mock.expect_enter()
        .expect(connect.as_str(), "Trying\n%CONNECT%\r");
    let mut link = scripted_link(mock);

    link.start_advertising()?;
    println!("Advertising started");

    let own = link.get_address_verified()?;
    println!("Module address: {}", own);

    let state = link.connect_to(&peer)?;
    println!("Connect to {}: {} (mode {})", peer, state, link.mode());
    link.transport_mut().set_link_present(true);

    link.send_payload(b"ping")?;
    link.transport_mut().inject(b"pong");
    let mut buf = [0u8; 16];
    let n = link.receive_payload(&mut buf)?;
    println!("Payload reply: {:?}", String::from_utf8_lossy(&buf[..n]));

    link.transport_mut()
        .expect_enter()
        .expect("K,1\r", "AOK")
        .expect_exit();
    link.transport_mut().set_link_present(false);
    link.disconnect()?;
    println!("Link state after disconnect: {}", link.link_state());

    println!("Bytes on the wire: {:?}\n", link.transport().sent_text());
    Ok(())
}

fn demo_failures() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Failure Handling ---");
    let peer: DeviceAddress = "001EC0AABBCC".parse()?;
    let connect = format!("C,0,{}\r", peer);

    let mut mock = MockTransport::new();
    mock.expect_enter()
        .expect(connect.as_str(), "Trying\n%ERR_CONN%")
        .expect_exit();
    let mut link = scripted_link(mock);

    match link.connect_to(&peer) {
        Err(e @ BleError::ConnectionRejected { .. }) => {
            println!("✓ Connection rejected: {}", e);
            println!("  State: {}, mode: {}", link.link_state(), link.mode());
            println!("  Strategy: {:?}", e.recovery_strategy());
        }
        other => println!("✗ Expected a rejection, got {:?}", other),
    }

    match link.send_payload(b"ping") {
        Err(e) => println!("✓ Payload refused: {}", e),
        Ok(()) => println!("✗ Payload sent without a link"),
    }

    // Module never answers the escape sequence
    match link.get_address() {
        Err(e) if e.is_timeout() => {
            println!("✓ Timed out: {}", e);
            println!("  Strategy: {:?}", e.recovery_strategy());
        }
        other => println!("✗ Expected a timeout, got {:?}", other),
    }

    println!("Failure demo completed\n");
    Ok(())
}

fn demo_serial_module(config: &BleConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Serial Module on {} ---", config.serial.port_name);

    let mut link = BleLink::open(config)?;
    println!("Link signal present: {}", link.is_link_up());

    match link.get_address() {
        Ok(address) => println!("Module address: {}", address),
        Err(e) => println!("Address query failed: {} (strategy {:?})", e, e.recovery_strategy()),
    }

    println!("Serial demo completed\n");
    Ok(())
}
