//! Beacon monitor for tag-beacon firmware.
//!
//! Run after flashing the firmware. Resets the tag, captures its console
//! output and checks the start-up banner and transmit reports.

mod console;
mod device;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use console::parse_hex_id;
use device::{resolve_port, TagConsole};
use tests::{capture, print_results, run_all_tests, Expectations};

#[derive(Parser)]
#[command(name = "beacon-monitor")]
#[command(about = "Checks a flashed test tag over its serial console")]
struct Args {
    /// Serial port for the tag (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Expected on-air identifier, hexadecimal (e.g. 0x78554C33)
    #[arg(short, long)]
    tag_id: Option<String>,

    /// Capture duration in seconds
    #[arg(short, long, default_value = "5")]
    duration: u64,

    /// Minimum number of transmissions expected during the capture
    #[arg(short, long, default_value = "3")]
    min_tx: usize,

    /// Do not reset the tag before capturing
    #[arg(long)]
    no_reset: bool,

    /// Echo recognised console lines
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let tag_id = args.tag_id.as_deref().map(parse_hex_id).transpose()?;

    // Resolve port (auto-detect if "auto")
    let port = resolve_port(&args.port)?;

    println!("{}", "Tag Beacon Monitor".bold());
    println!("Port: {}", port);
    println!("Baud: {}", args.baud);
    if let Some(id) = tag_id {
        println!("Expected id: 0x{:08X}", id);
    }
    println!();

    println!("Connecting to tag...");
    let mut console = TagConsole::new(&port, args.baud)?;
    console.clear_buffer()?;
    println!("{}", "Connected!".green());

    // The banner is only printed at start-up
    if !args.no_reset {
        println!("Resetting tag...");
        console.hard_reset()?;
    }

    println!("\nCapturing for {} s...\n", args.duration);
    let session = capture(&mut console, Duration::from_secs(args.duration), args.verbose)?;

    let expect = Expectations {
        tag_id,
        min_transmissions: args.min_tx,
    };
    println!("Running checks...\n");
    let results = run_all_tests(&session, &expect);
    print_results(&results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
