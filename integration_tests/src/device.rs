//! Tag serial console client.

use std::io::Read;
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::{SerialPort, SerialPortType};

/// Espressif USB vendor id (USB serial/JTAG console)
const ESPRESSIF_VID: u16 = 0x303A;

/// Find the tag console: the first Espressif USB port, else the first ttyACM device.
pub fn find_console_port() -> Result<String> {
    let ports = serialport::available_ports()?;

    let espressif = ports.iter().find(|info| match &info.port_type {
        SerialPortType::UsbPort(usb) => usb.vid == ESPRESSIF_VID,
        _ => false,
    });
    if let Some(info) = espressif {
        return Ok(info.port_name.clone());
    }

    match ports.iter().find(|info| info.port_name.contains("ttyACM")) {
        Some(info) => Ok(info.port_name.clone()),
        None => anyhow::bail!("No console port found - ensure the tag is connected"),
    }
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg == "auto" {
        find_console_port()
    } else {
        Ok(port_arg.to_string())
    }
}

/// Line reader for the tag's log output.
pub struct TagConsole {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl TagConsole {
    /// Open the console.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Clear any pending data in the serial buffer.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();
        Ok(())
    }

    /// Reset the tag through the RTS line, the same way esptool does.
    pub fn hard_reset(&mut self) -> Result<()> {
        self.port.write_data_terminal_ready(false)?;
        self.port.write_request_to_send(true)?;
        std::thread::sleep(Duration::from_millis(100));
        self.port.write_request_to_send(false)?;
        Ok(())
    }

    /// Read one line, without its terminator.
    ///
    /// Returns `None` if no complete line arrives within `timeout`.
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line);
                return Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()));
            }

            if start.elapsed() >= timeout {
                return Ok(None);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
