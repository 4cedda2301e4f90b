//! The encode-and-write loop.
//!
//! This module contains [`Uploader`] which pushes a byte buffer to the
//! target by driving its shell: one echo command truncates the destination
//! file, then a sequence of echo commands appends the source bytes as
//! `\xNN` escape sequences a few bytes at a time.

use std::fmt::Write;
use std::thread;
use std::time::Duration;
use log::{info, trace};
use crate::config::{Config, DEFAULT_BYTES_PER_LINE};
use crate::error::Failed;
use crate::transport::Transport;


//------------ Uploader ------------------------------------------------------

/// Uploads a byte buffer by driving the target’s shell.
pub struct Uploader<'a> {
    /// The transport the target shell is reachable over.
    transport: &'a mut dyn Transport,

    /// The number of source bytes encoded into a single echo command.
    bytes_per_line: usize,

    /// How long to pause after each command.
    wait_time: Duration,
}

impl<'a> Uploader<'a> {
    /// Creates a new uploader atop the given transport.
    pub fn new(transport: &'a mut dyn Transport, config: &Config) -> Self {
        Uploader {
            transport,
            bytes_per_line: if config.bytes_per_line == 0 {
                DEFAULT_BYTES_PER_LINE
            }
            else {
                config.bytes_per_line
            },
            wait_time: config.wait_time,
        }
    }

    /// Transfers `data` into the file `destination` on the target.
    ///
    /// The destination path is interpolated into the shell commands as
    /// given. Quoting for exotic paths is not attempted since the quoting
    /// rules of the minimal shells this runs against aren’t knowable.
    ///
    /// Returns the number of bytes transferred. An empty buffer still
    /// truncates the destination file.
    pub fn put(
        &mut self, data: &[u8], destination: &str
    ) -> Result<u64, Failed> {
        let total = data.len();

        // Create/zero the destination file.
        self.command(&format!("echo -ne > {}", destination))?;

        let mut written = 0;
        for chunk in data.chunks(self.bytes_per_line) {
            self.command(&format!(
                "echo -ne \"{}\" >> {}", encode_chunk(chunk), destination
            ))?;
            written += chunk.len();
            info!("{} / {}", written, total);
        }
        Ok(written as u64)
    }

    /// Sends a single shell command to the target.
    ///
    /// The command is wrapped in newlines. The leading one flushes
    /// anything already sitting on the target’s command line, the trailing
    /// one executes the command. After each command we pause so the target
    /// can finish its disk or flash I/O before the next one arrives.
    fn command(&mut self, command: &str) -> Result<(), Failed> {
        trace!("shell: {}", command);
        self.transport.send(format!("\n{}\n", command).as_bytes())?;
        thread::sleep(self.wait_time);
        Ok(())
    }
}


//------------ Helpers -------------------------------------------------------

/// Renders a chunk of bytes as a string of `\xNN` escapes.
///
/// Every byte is escaped, printable or not, with two uppercase hex digits.
fn encode_chunk(chunk: &[u8]) -> String {
    let mut res = String::with_capacity(chunk.len() * 4);
    for &byte in chunk {
        let _ = write!(res, "\\x{:02X}", byte);
    }
    res
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    //-------- MockTransport ------------------------------------------------

    /// A transport that just records everything sent over it.
    #[derive(Default)]
    struct MockTransport {
        sent: Vec<u8>,
    }

    impl Transport for MockTransport {
        fn send(&mut self, data: &[u8]) -> Result<(), Failed> {
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn describe(&self) -> &str {
            "mock"
        }
    }

    /// Runs an upload with the given chunk size and returns what was sent.
    fn run_put(
        data: &[u8], destination: &str, bytes_per_line: usize
    ) -> (u64, String) {
        let mut transport = MockTransport::default();
        let config = Config {
            bytes_per_line,
            wait_time: Duration::ZERO,
            ..Default::default()
        };
        let res = Uploader::new(&mut transport, &config)
            .put(data, destination)
            .unwrap();
        (res, String::from_utf8(transport.sent).unwrap())
    }

    /// Extracts the uploaded bytes back out of the sent command stream.
    fn decode_sent(sent: &str) -> Vec<u8> {
        let mut res = Vec::new();
        for line in sent.lines().filter(|line| line.contains(">>")) {
            let escapes = line.split('"').nth(1).unwrap();
            for part in escapes.split("\\x").skip(1) {
                res.push(u8::from_str_radix(part, 16).unwrap());
            }
        }
        res
    }

    //-------- Tests ---------------------------------------------------------

    #[test]
    fn empty_source_truncates_destination() {
        let (written, sent) = run_put(b"", "/tmp/out", 20);
        assert_eq!(written, 0);
        assert_eq!(sent, "\necho -ne > /tmp/out\n");
    }

    #[test]
    fn exact_command_stream() {
        let (written, sent) = run_put(b"AB\n\x00\xff", "/lib/x.so", 2);
        assert_eq!(written, 5);
        assert_eq!(
            sent,
            "\necho -ne > /lib/x.so\n\
             \necho -ne \"\\x41\\x42\" >> /lib/x.so\n\
             \necho -ne \"\\x0A\\x00\" >> /lib/x.so\n\
             \necho -ne \"\\xFF\" >> /lib/x.so\n"
        );
    }

    #[test]
    fn chunking_at_boundary() {
        // Four bytes in chunks of two: no trailing short command.
        let (_, sent) = run_put(b"\x01\x02\x03\x04", "f", 2);
        assert_eq!(
            sent.matches(">>").count(), 2
        );
        // Five bytes in chunks of two: one extra short command.
        let (_, sent) = run_put(b"\x01\x02\x03\x04\x05", "f", 2);
        assert_eq!(
            sent.matches(">>").count(), 3
        );
    }

    #[test]
    fn all_bytes_in_order() {
        let data: Vec<u8> = (0..=255).collect();
        let (written, sent) = run_put(&data, "/tmp/all", 20);
        assert_eq!(written, 256);
        assert_eq!(decode_sent(&sent), data);
    }

    #[test]
    fn zero_chunk_size_falls_back_to_default() {
        let data = [0x55u8; 40];
        let (_, sent) = run_put(&data, "f", 0);
        assert_eq!(sent.matches(">>").count(), 2);
    }

    #[test]
    fn escapes_are_uppercase_hex() {
        assert_eq!(encode_chunk(b"\x00\x0a\xab\xff"), "\\x00\\x0A\\xAB\\xFF");
        assert_eq!(encode_chunk(b""), "");
    }
}
