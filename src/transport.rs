//! The transports a target shell can be reached over.
//!
//! This module provides the [`Transport`] trait for a blocking, line
//! oriented connection to the target system plus its two implementations:
//! [`SerialLine`] for a directly attached serial device and [`TelnetLine`]
//! for a Telnet session over TCP.

use std::fmt;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use log::{debug, error};
use crate::config::Config;
use crate::error::Failed;


//------------ Constants -----------------------------------------------------

/// How long to keep reading while waiting for a login or password prompt.
///
/// We never match on prompt content, we only consume whatever the target
/// prints until it goes quiet for this long.
const PROMPT_WINDOW: Duration = Duration::from_millis(500);

/// The write timeout for the serial device.
const SERIAL_WRITE_TIMEOUT: Duration = Duration::from_secs(10);


//------------ Transport -----------------------------------------------------

/// A blocking connection to the target system’s shell.
///
/// A transport only needs to be able to accept bytes. Each write blocks
/// until the transport has accepted all of them. Pacing between commands
/// is the caller’s business.
pub trait Transport {
    /// Sends all the given bytes to the target.
    fn send(&mut self, data: &[u8]) -> Result<(), Failed>;

    /// Returns a human-readable description of the transport.
    fn describe(&self) -> &str;
}


//------------ SerialLine ----------------------------------------------------

/// A serial device the target’s console is attached to.
pub struct SerialLine {
    /// The open device.
    port: Box<dyn serialport::SerialPort>,

    /// The device path for messages.
    name: String,
}

impl SerialLine {
    /// Opens the serial device given by the configuration.
    pub fn open(config: &Config) -> Result<Self, Failed> {
        let port = match serialport::new(
            config.port.as_str(), config.baud_rate
        ).timeout(SERIAL_WRITE_TIMEOUT).open() {
            Ok(port) => port,
            Err(err) => {
                error!(
                    "Failed to open serial port {}: {}",
                    config.port, err
                );
                return Err(Failed)
            }
        };
        debug!(
            "Opened serial port {} at {} baud.",
            config.port, config.baud_rate
        );
        Ok(SerialLine {
            port,
            name: config.port.clone(),
        })
    }
}

impl Transport for SerialLine {
    fn send(&mut self, data: &[u8]) -> Result<(), Failed> {
        if let Err(err) = self.port.write_all(data).and_then(|_| {
            self.port.flush()
        }) {
            error!("Failed to write to {}: {}", self.name, err);
            return Err(Failed)
        }
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.name
    }
}


//------------ TelnetLine ----------------------------------------------------

/// A Telnet session to the target system.
///
/// This isn’t real Telnet: option negotiation is skipped entirely and the
/// stream is used for plain reads and writes, which is what the minimal
/// Telnet daemons on embedded targets expect anyway.
pub struct TelnetLine {
    /// The TCP connection to the target.
    stream: TcpStream,

    /// The target address for messages.
    peer: String,
}

impl TelnetLine {
    /// Connects to the Telnet host given by the configuration.
    ///
    /// If the configuration contains a login name, performs the login
    /// dance: drain whatever the target prints, send the login line, drain
    /// again, send the password line, then drain the shell banner. Prompt
    /// content is never matched, only consumed.
    pub fn connect(config: &Config) -> Result<Self, Failed> {
        let host = match config.host {
            Some(ref host) => host.as_str(),
            None => {
                error!("No Telnet host configured.");
                return Err(Failed)
            }
        };
        let peer = format!("{}:{}", host, config.telnet_port);
        let stream = Self::connect_stream(&peer, config.connect_timeout)?;
        let mut res = TelnetLine { stream, peer };
        if let Some(ref login) = config.login {
            res.drain(PROMPT_WINDOW)?;
            res.send_line(login)?;
            res.drain(PROMPT_WINDOW)?;
            res.send_line(config.password.as_deref().unwrap_or(""))?;
        }
        // Skip the shell banner.
        res.drain(config.wait_time)?;
        Ok(res)
    }

    /// Opens the TCP connection, trying each resolved address in turn.
    fn connect_stream(
        peer: &str, timeout: Duration
    ) -> Result<TcpStream, Failed> {
        let addrs: Vec<SocketAddr> = match peer.to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(err) => {
                error!("Failed to resolve {}: {}", peer, err);
                return Err(Failed)
            }
        };
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!("Connected to {}.", addr);
                    return Ok(stream)
                }
                Err(err) => last_err = Some(err),
            }
        }
        match last_err {
            Some(err) => {
                error!("Failed to connect to {}: {}", peer, err);
            }
            None => {
                error!("Failed to resolve {}: no addresses.", peer);
            }
        }
        Err(Failed)
    }

    /// Sends a single newline-terminated line.
    fn send_line(&mut self, line: &str) -> Result<(), Failed> {
        self.send(line.as_bytes())?;
        self.send(b"\n")
    }

    /// Consumes input from the target until it goes quiet.
    ///
    /// Keeps reading until a read produces no data within `window`. The
    /// consumed bytes only show up in the debug log.
    fn drain(&mut self, window: Duration) -> Result<(), Failed> {
        // A zero timeout is not allowed on a TCP stream.
        let window = window.max(Duration::from_millis(1));
        if let Err(err) = self.stream.set_read_timeout(Some(window)) {
            error!("Failed to configure {}: {}", self.peer, err);
            return Err(Failed)
        }
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break, // EOF. Sending will fail soon enough.
                Ok(n) => {
                    debug!(
                        "target: {}",
                        String::from_utf8_lossy(&buf[..n]).trim_end()
                    );
                }
                Err(err) if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                ) => break,
                Err(err) => {
                    error!("Failed to read from {}: {}", self.peer, err);
                    return Err(Failed)
                }
            }
        }
        Ok(())
    }
}

impl Transport for TelnetLine {
    fn send(&mut self, data: &[u8]) -> Result<(), Failed> {
        if let Err(err) = self.stream.write_all(data) {
            error!("Failed to write to {}: {}", self.peer, err);
            return Err(Failed)
        }
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.peer
    }
}


//--- Debug

impl fmt::Debug for TelnetLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TelnetLine").field("peer", &self.peer).finish()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::thread;

    /// What the fake target saw during a session.
    struct Session {
        login: String,
        password: String,
        payload: Vec<u8>,
    }

    /// Runs a minimal Telnet target on a loopback listener.
    fn fake_target(listener: TcpListener) -> thread::JoinHandle<Session> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(
                stream.try_clone().unwrap()
            );
            let mut stream = stream;

            stream.write_all(b"buildroot login: ").unwrap();
            let mut login = String::new();
            reader.read_line(&mut login).unwrap();

            stream.write_all(b"Password: ").unwrap();
            let mut password = String::new();
            reader.read_line(&mut password).unwrap();

            stream.write_all(b"\nWelcome.\n# ").unwrap();

            let mut payload = Vec::new();
            reader.read_to_end(&mut payload).unwrap();
            Session {
                login: login.trim_end().into(),
                password: password.trim_end().into(),
                payload,
            }
        })
    }

    #[test]
    fn telnet_login_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = fake_target(listener);

        let config = Config {
            host: Some("127.0.0.1".into()),
            telnet_port: port,
            login: Some("root".into()),
            password: Some("toor".into()),
            ..Default::default()
        };
        let mut transport = TelnetLine::connect(&config).unwrap();
        transport.send(b"\necho -ne > /tmp/out\n").unwrap();
        drop(transport);

        let session = target.join().unwrap();
        assert_eq!(session.login, "root");
        assert_eq!(session.password, "toor");
        assert_eq!(session.payload, b"\necho -ne > /tmp/out\n");
    }

    #[test]
    fn telnet_without_login() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"# ").unwrap();
            let mut payload = Vec::new();
            stream.read_to_end(&mut payload).unwrap();
            payload
        });

        let config = Config {
            host: Some("127.0.0.1".into()),
            telnet_port: port,
            ..Default::default()
        };
        let mut transport = TelnetLine::connect(&config).unwrap();
        transport.send(b"hello\n").unwrap();
        drop(transport);

        assert_eq!(target.join().unwrap(), b"hello\n");
    }

    #[test]
    fn telnet_requires_host() {
        assert!(TelnetLine::connect(&Config::default()).is_err());
    }

    #[test]
    fn telnet_connect_refused() {
        // Bind and drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config {
            host: Some("127.0.0.1".into()),
            telnet_port: port,
            ..Default::default()
        };
        assert!(TelnetLine::connect(&config).is_err());
    }
}
