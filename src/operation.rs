//! What echoput can do for you.
//!
//! This module implements all the commands users can ask echoput to
//! perform. They are encapsulated in the type [`Operation`] which can
//! determine the command from the command line arguments and then execute
//! it.

use std::fs;
use std::path::{Path, PathBuf};
use clap::{ArgMatches, Args, FromArgMatches, Parser};
use log::{error, info};
use serialport::SerialPortType;
use crate::config::Config;
use crate::error::{ExitError, Failed};
use crate::log::Logger;
use crate::transport::{SerialLine, TelnetLine, Transport};
use crate::upload::Uploader;


//------------ Operation -----------------------------------------------------

/// The command to execute.
///
/// This type collects all the commands we have defined plus any possible
/// extra configuration they support.
///
/// You can create a value from the command line arguments. First, you add
/// all necessary sub-commands and arguments to a clap `Command` via
/// [`config_args`][Self::config_args] and then process the argument matches
/// into a value in [`from_arg_matches`][Self::from_arg_matches]. Finally,
/// you can execute the created command through the [`run`][Self::run]
/// method.
pub enum Operation {
    Put(Put),
    Ports(Ports),
}

impl Operation {
    /// Prepares everything.
    ///
    /// Call this before doing anything else.
    pub fn prepare() -> Result<(), Failed> {
        Logger::init()
    }

    /// Adds the command configuration to a clap command.
    pub fn config_args(app: clap::Command) -> clap::Command {
        let app = Put::config_args(app);
        Ports::config_args(app)
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        Ok(match matches.subcommand() {
            Some(("put", matches)) => {
                Operation::Put(Put::from_arg_matches(matches, cur_dir)?)
            }
            Some(("ports", matches)) => {
                Operation::Ports(Ports::from_arg_matches(matches)?)
            }
            _ => {
                error!(
                    "Failed: a command is required.\n\
                     \nCommands are:\
                     \n   put     Upload a file to the target system\
                     \n   ports   List the serial ports on this host\
                     \n\
                     \nSee echoput -h for a usage summary."
                );
                return Err(Failed)
            }
        })
    }

    /// Runs the command.
    pub fn run(self, config: Config) -> Result<(), ExitError> {
        Logger::switch_logging(&config)?;
        match self {
            Operation::Put(cmd) => cmd.run(config),
            Operation::Ports(cmd) => cmd.run(config),
        }
    }
}


//------------ Put -----------------------------------------------------------

/// Upload a file to the target system.
#[derive(Clone, Debug, Parser)]
pub struct Put {
    /// Path to the local file to upload
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Path of the file to create on the target system
    #[arg(value_name = "DESTINATION")]
    destination: String,
}

impl Put {
    /// Adds the command configuration to a clap command.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            Put::augment_args(
                clap::Command::new("put")
                    .about("Uploads a file to the target system")
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let mut res = <Put as FromArgMatches>::from_arg_matches(
            matches
        ).expect("bug in command line arguments parser");
        res.source = cur_dir.join(&res.source);
        Ok(res)
    }

    /// Uploads the source file.
    ///
    /// Reads the whole source file into memory, opens the transport the
    /// configuration selects – Telnet if a host is configured, the serial
    /// device otherwise – and drives the upload loop.
    pub fn run(self, config: Config) -> Result<(), ExitError> {
        let data = match fs::read(&self.source) {
            Ok(data) => data,
            Err(err) => {
                error!(
                    "Failed to read {}: {}", self.source.display(), err
                );
                return Err(ExitError::Generic)
            }
        };

        let mut transport: Box<dyn Transport> = if config.host.is_some() {
            Box::new(TelnetLine::connect(&config)?)
        }
        else {
            Box::new(SerialLine::open(&config)?)
        };
        info!(
            "Uploading {} bytes to {} via {}.",
            data.len(), self.destination, transport.describe()
        );

        let written = Uploader::new(transport.as_mut(), &config)
            .put(&data, &self.destination)
            .map_err(|_| ExitError::IncompleteTransfer)?;

        println!(
            "Uploaded {} bytes from {} to {}",
            written, self.source.display(), self.destination
        );
        Ok(())
    }
}


//------------ Ports ---------------------------------------------------------

/// List the serial ports on this host.
pub struct Ports;

impl Ports {
    /// Adds the command configuration to a clap command.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            clap::Command::new("ports")
                .about("Lists the serial ports on this host")
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(_matches: &ArgMatches) -> Result<Self, Failed> {
        Ok(Ports)
    }

    /// Prints one line per serial port visible on this host.
    pub fn run(self, _config: Config) -> Result<(), ExitError> {
        let ports = match serialport::available_ports() {
            Ok(ports) => ports,
            Err(err) => {
                error!("Failed to enumerate serial ports: {}", err);
                return Err(ExitError::Generic)
            }
        };
        if ports.is_empty() {
            info!("No serial ports found.");
            return Ok(())
        }
        for port in ports {
            match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    println!(
                        "{}\tUSB {:04x}:{:04x}{}",
                        port.port_name, usb.vid, usb.pid,
                        match usb.product {
                            Some(ref product) => format!(" {}", product),
                            None => String::new(),
                        }
                    );
                }
                SerialPortType::PciPort => {
                    println!("{}\tPCI", port.port_name);
                }
                SerialPortType::BluetoothPort => {
                    println!("{}\tBluetooth", port.port_name);
                }
                SerialPortType::Unknown => {
                    println!("{}", port.port_name);
                }
            }
        }
        Ok(())
    }
}
