//! Configuration.
//!
//! This module primarily contains the type [`Config`] that holds all the
//! configuration used by echoput. It can be loaded both from a TOML
//! formatted config file and command line options.

use std::{env, fmt, fs};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use clap::{ArgAction, ArgMatches, Args, Command, FromArgMatches, Parser};
use dirs::home_dir;
use log::{LevelFilter, error};
#[cfg(unix)] use syslog::Facility;
use crate::error::Failed;


//------------ Defaults for Some Values --------------------------------------

/// The default serial device.
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// The default serial baud rate.
const DEFAULT_BAUD_RATE: u32 = 115_200;

/// The default Telnet port.
const DEFAULT_TELNET_PORT: u16 = 23;

/// The default time to wait after each command in milliseconds.
const DEFAULT_WAIT_TIME: u64 = 10;

/// The default number of bytes sent per echo command.
pub(crate) const DEFAULT_BYTES_PER_LINE: usize = 20;

/// The default Telnet connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT: u64 = 10;


//------------ Config --------------------------------------------------------

/// echoput configuration.
///
/// This type contains the transport selection and tuning knobs as well as
/// the logging configuration. All values are public and can be accessed
/// directly.
///
/// The function [`config_args`][Self::config_args] adds the command line
/// arguments to a clap command. The matches can then be turned into a value
/// via [`from_arg_matches`][Self::from_arg_matches] which also reads the
/// config file if one was given via `-c` or exists at the default location
/// `$HOME/.echoput.conf`. Command line options override file values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The serial device to use.
    pub port: String,

    /// The baud rate for the serial device.
    pub baud_rate: u32,

    /// The host to connect to via Telnet.
    ///
    /// If this is `Some(_)`, the Telnet transport is used instead of the
    /// serial line.
    pub host: Option<String>,

    /// The TCP port for the Telnet connection.
    pub telnet_port: u16,

    /// The login name to send when the Telnet target asks for one.
    pub login: Option<String>,

    /// The password to send after the login name.
    pub password: Option<String>,

    /// How long to pause after each newline-terminated write.
    ///
    /// The target system needs time for disk or flash I/O between echo
    /// commands.
    pub wait_time: Duration,

    /// The number of source bytes encoded into a single echo command.
    pub bytes_per_line: usize,

    /// The timeout for establishing the Telnet connection.
    pub connect_timeout: Duration,

    /// The log levels to be logged.
    pub log_level: LevelFilter,

    /// The target to log to.
    pub log_target: LogTarget,
}

impl Config {
    /// Adds the basic arguments to a clap command.
    ///
    /// The function follows clap’s builder pattern: it takes a command,
    /// adds a bunch of arguments to it and returns it at the end.
    pub fn config_args(app: Command) -> Command {
        GlobalArgs::augment_args(app)
    }

    /// Creates a configuration from command line matches.
    ///
    /// The function attempts to create a configuration from the command
    /// line arguments provided via `matches`. It will try to read a config
    /// file if provided via the config file option (`-c` or `--config`) or
    /// a file in `$HOME/.echoput.conf` otherwise. If the latter doesn’t
    /// exist either, starts with a default configuration.
    ///
    /// All relative paths given in command line arguments will be
    /// interpreted relative to `cur_dir`. Conversely, paths in the config
    /// file are treated as relative to the config file’s directory.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let mut res = Self::create_base_config(
            Self::path_value_of(matches, "config", cur_dir)
                .as_ref().map(AsRef::as_ref)
        )?;
        res.apply_arg_matches(matches, cur_dir)?;
        Ok(res)
    }

    /// Applies the command line arguments to a configuration.
    ///
    /// The path arguments in `matches` will be interpreted relative to
    /// `cur_dir`.
    fn apply_arg_matches(
        &mut self,
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<(), Failed> {
        let args = GlobalArgs::from_arg_matches(
            matches
        ).expect("bug in command line arguments parser");

        // log_target - Goes first so we can move things out of args later.
        self.apply_log_matches(&args, cur_dir)?;

        // port
        if let Some(port) = args.port {
            self.port = port
        }

        // baud_rate
        if let Some(rate) = args.baud_rate {
            self.baud_rate = rate
        }

        // host
        if let Some(host) = args.host {
            self.host = Some(host)
        }

        // telnet_port
        if let Some(port) = args.telnet_port {
            self.telnet_port = port
        }

        // login
        if let Some(login) = args.login {
            self.login = Some(login)
        }

        // password
        if let Some(password) = args.password {
            self.password = Some(password)
        }

        // wait_time
        if let Some(value) = args.wait_time {
            self.wait_time = Duration::from_millis(value)
        }

        // bytes_per_line
        //
        // A chunk size of zero makes no progress, fall back to the default.
        if let Some(value) = args.bytes_per_line {
            self.bytes_per_line = if value == 0 {
                DEFAULT_BYTES_PER_LINE
            }
            else {
                value
            }
        }

        // connect_timeout
        if let Some(value) = args.connect_timeout {
            self.connect_timeout = Duration::from_secs(value)
        }

        // log_level
        if args.verbose > 1 {
            self.log_level = LevelFilter::Trace
        }
        else if args.verbose == 1 {
            self.log_level = LevelFilter::Debug
        }
        else if args.quiet > 1 {
            self.log_level = LevelFilter::Off
        }
        else if args.quiet == 1 {
            self.log_level = LevelFilter::Error
        }

        Ok(())
    }

    /// Applies the logging-specific command line arguments to the config.
    ///
    /// This is the Unix version that also considers syslog as a valid
    /// target.
    #[cfg(unix)]
    fn apply_log_matches(
        &mut self,
        args: &GlobalArgs,
        cur_dir: &Path,
    ) -> Result<(), Failed> {
        if args.syslog {
            let facility = match args.syslog_facility.as_ref() {
                Some(facility) => match Facility::from_str(facility) {
                    Ok(value) => value,
                    Err(_) => {
                        error!("Invalid value for syslog-facility.");
                        return Err(Failed);
                    }
                }
                None => Facility::LOG_USER,
            };
            self.log_target = LogTarget::Syslog(facility)
        }
        else if let Some(file) = args.logfile.as_ref() {
            if file == "-" {
                self.log_target = LogTarget::Stderr
            }
            else {
                self.log_target = LogTarget::File(cur_dir.join(file))
            }
        }
        Ok(())
    }

    /// Applies the logging-specific command line arguments to the config.
    ///
    /// This is the non-Unix version that does not use syslog.
    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps)]
    fn apply_log_matches(
        &mut self,
        args: &GlobalArgs,
        cur_dir: &Path,
    ) -> Result<(), Failed> {
        if let Some(file) = args.logfile.as_ref() {
            if file == "-" {
                self.log_target = LogTarget::Stderr
            }
            else {
                self.log_target = LogTarget::File(cur_dir.join(file))
            }
        }
        Ok(())
    }

    /// Returns a path value in arg matches.
    ///
    /// This expands a relative path based on the given directory.
    fn path_value_of(
        matches: &ArgMatches,
        key: &str,
        dir: &Path
    ) -> Option<PathBuf> {
        matches.get_one::<PathBuf>(key).map(|path| dir.join(path))
    }

    /// Creates the correct base configuration for the given config file path.
    ///
    /// If no config path is given, tries to read the default config in
    /// `$HOME/.echoput.conf`. If that doesn’t exist, creates a default
    /// config.
    fn create_base_config(path: Option<&Path>) -> Result<Self, Failed> {
        let file = match path {
            Some(path) => {
                match ConfigFile::read(path)? {
                    Some(file) => file,
                    None => {
                        error!("Cannot read config file {}", path.display());
                        return Err(Failed);
                    }
                }
            }
            None => {
                match home_dir() {
                    Some(dir) => match ConfigFile::read(
                        &dir.join(".echoput.conf")
                    )? {
                        Some(file) => file,
                        None => return Ok(Self::default()),
                    }
                    None => return Ok(Self::default())
                }
            }
        };
        Self::from_config_file(file)
    }

    /// Creates a base config from a config file.
    fn from_config_file(mut file: ConfigFile) -> Result<Self, Failed> {
        let log_target = Self::log_target_from_config_file(&mut file)?;
        let res = Config {
            port: file.take_string("port")?
                .unwrap_or_else(|| DEFAULT_PORT.into()),
            baud_rate: file.take_u32("baud-rate")?
                .unwrap_or(DEFAULT_BAUD_RATE),
            host: file.take_string("host")?,
            telnet_port: file.take_u16("telnet-port")?
                .unwrap_or(DEFAULT_TELNET_PORT),
            login: file.take_string("login")?,
            password: file.take_string("password")?,
            wait_time: Duration::from_millis(
                file.take_u64("wait-time")?.unwrap_or(DEFAULT_WAIT_TIME)
            ),
            bytes_per_line: {
                match file.take_usize("bytes-per-line")? {
                    Some(0) | None => DEFAULT_BYTES_PER_LINE,
                    Some(value) => value,
                }
            },
            connect_timeout: Duration::from_secs(
                file.take_u64("connect-timeout")?
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
            ),
            log_level: file.take_from_str("log-level")?
                .unwrap_or(LevelFilter::Info),
            log_target,
        };
        file.check_exhausted()?;
        Ok(res)
    }

    /// Determines the logging target from the config file.
    ///
    /// This is the Unix version that also considers syslog as a valid
    /// target.
    #[cfg(unix)]
    fn log_target_from_config_file(
        file: &mut ConfigFile
    ) -> Result<LogTarget, Failed> {
        let facility = file.take_string("syslog-facility")?;
        let facility = facility.as_ref().map(AsRef::as_ref)
            .unwrap_or("user");
        let facility = match Facility::from_str(facility) {
            Ok(value) => value,
            Err(_) => {
                error!(
                    "Failed in config file {}: invalid syslog-facility.",
                    file.path.display()
                );
                return Err(Failed);
            }
        };
        let log_target = file.take_string("log")?;
        let log_file = file.take_path("log-file")?;
        match log_target.as_ref().map(AsRef::as_ref) {
            Some("stderr") | None => Ok(LogTarget::Stderr),
            Some("syslog") => Ok(LogTarget::Syslog(facility)),
            Some("file") => {
                match log_file {
                    Some(file) => Ok(LogTarget::File(file)),
                    None => {
                        error!(
                            "Failed in config file {}: \
                             log target \"file\" requires 'log-file' value.",
                            file.path.display()
                        );
                        Err(Failed)
                    }
                }
            }
            Some(value) => {
                error!(
                    "Failed in config file {}: invalid log target '{}'",
                    file.path.display(), value
                );
                Err(Failed)
            }
        }
    }

    /// Determines the logging target from the config file.
    ///
    /// This is the non-Unix version that does not use syslog.
    #[cfg(not(unix))]
    fn log_target_from_config_file(
        file: &mut ConfigFile
    ) -> Result<LogTarget, Failed> {
        let log_target = file.take_string("log")?;
        let log_file = file.take_path("log-file")?;
        match log_target.as_ref().map(AsRef::as_ref) {
            Some("stderr") | None => Ok(LogTarget::Stderr),
            Some("file") => {
                match log_file {
                    Some(file) => Ok(LogTarget::File(file)),
                    None => {
                        error!(
                            "Failed in config file {}: \
                             log target \"file\" requires 'log-file' value.",
                            file.path.display()
                        );
                        Err(Failed)
                    }
                }
            }
            Some(value) => {
                error!(
                    "Failed in config file {}: invalid log target '{}'",
                    file.path.display(), value
                );
                Err(Failed)
            }
        }
    }
}


//--- Default

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            host: None,
            telnet_port: DEFAULT_TELNET_PORT,
            login: None,
            password: None,
            wait_time: Duration::from_millis(DEFAULT_WAIT_TIME),
            bytes_per_line: DEFAULT_BYTES_PER_LINE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            log_level: LevelFilter::Info,
            log_target: LogTarget::default(),
        }
    }
}


//------------ LogTarget -----------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Default)]
pub enum LogTarget {
    /// Syslog.
    ///
    /// The argument is the syslog facility to use.
    #[cfg(unix)]
    Syslog(Facility),

    /// Stderr.
    #[default]
    Stderr,

    /// A file.
    ///
    /// The argument is the file name.
    File(PathBuf)
}


//--- PartialEq and Eq

impl PartialEq for LogTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            #[cfg(unix)]
            (&LogTarget::Syslog(s), &LogTarget::Syslog(o)) => {
                (s as usize) == (o as usize)
            }
            (&LogTarget::Stderr, &LogTarget::Stderr) => true,
            (&LogTarget::File(ref s), &LogTarget::File(ref o)) => {
                s == o
            }
            _ => false
        }
    }
}

impl Eq for LogTarget { }


//------------ GlobalArgs ----------------------------------------------------

/// The global command line arguments.
#[derive(Clone, Debug, Parser)]
struct GlobalArgs {
    /// Read base configuration from this file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// The serial device to use
    #[arg(short, long, value_name = "DEVICE")]
    port: Option<String>,

    /// Baud rate for the serial device
    #[arg(short, long, value_name = "RATE")]
    baud_rate: Option<u32>,

    /// Upload via Telnet to this host instead of the serial device
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// TCP port for the Telnet connection
    #[arg(long, value_name = "PORT")]
    telnet_port: Option<u16>,

    /// Login name for the Telnet session
    #[arg(long, value_name = "NAME")]
    login: Option<String>,

    /// Password for the Telnet session
    #[arg(long, value_name = "PASSWORD")]
    password: Option<String>,

    /// Time to wait after each echo command in milliseconds
    #[arg(short = 't', long, value_name = "MILLIS")]
    wait_time: Option<u64>,

    /// Number of bytes to send per echo command
    #[arg(long, value_name = "COUNT")]
    bytes_per_line: Option<usize>,

    /// Timeout for establishing the Telnet connection in seconds
    #[arg(long, value_name = "SECONDS")]
    connect_timeout: Option<u64>,

    /// Log more information, twice for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log less information, twice for no information
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Log to syslog
    #[cfg(unix)]
    #[arg(long)]
    syslog: bool,

    /// Facility to use for syslog logging
    #[cfg(unix)]
    #[arg(long, value_name = "FACILITY")]
    syslog_facility: Option<String>,

    /// Log to this file
    #[arg(long, value_name = "PATH")]
    logfile: Option<String>,
}


//------------ ConfigFile ----------------------------------------------------

/// The content of a config file.
///
/// This is a thin wrapper around `toml::Table` to make dealing with it more
/// convenient.
#[derive(Clone, Debug)]
struct ConfigFile {
    /// The content of the file.
    content: toml::value::Table,

    /// The path to the config file.
    path: PathBuf,

    /// The directory we found the file in.
    ///
    /// This is used in relative paths.
    dir: PathBuf,
}

impl ConfigFile {
    /// Reads the config file at the given path.
    ///
    /// If there is no such file, returns `None`. If there is a file but it
    /// is broken, aborts.
    #[allow(clippy::verbose_file_reads)]
    fn read(path: &Path) -> Result<Option<Self>, Failed> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(_) => return Ok(None)
        };
        let mut config = String::new();
        if let Err(err) = file.read_to_string(&mut config) {
            error!(
                "Failed to read config file {}: {}",
                path.display(), err
            );
            return Err(Failed);
        }
        Self::parse(&config, path).map(Some)
    }

    /// Parses the content of the file from a string.
    fn parse(content: &str, path: &Path) -> Result<Self, Failed> {
        let content = match toml::from_str(content) {
            Ok(toml::Value::Table(content)) => content,
            Ok(_) => {
                error!(
                    "Failed to parse config file {}: Not a mapping.",
                    path.display()
                );
                return Err(Failed);
            }
            Err(err) => {
                error!(
                    "Failed to parse config file {}: {}",
                    path.display(), err
                );
                return Err(Failed);
            }
        };
        let dir = if path.is_relative() {
            path.join(match env::current_dir() {
                Ok(dir) => dir,
                Err(err) => {
                    error!(
                        "Fatal: Can't determine current directory: {}.",
                        err
                    );
                    return Err(Failed);
                }
            }).parent().unwrap().into() // a file always has a parent
        }
        else {
            path.parent().unwrap().into()
        };
        Ok(ConfigFile {
            content,
            path: path.into(),
            dir
        })
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is negative.
    fn take_u64(&mut self, key: &str) -> Result<Option<u64>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::Integer(res) = value {
                    if res < 0 {
                        error!(
                            "Failed in config file {}: \
                            '{}' expected to be a positive integer.",
                            self.path.display(), key
                        );
                        Err(Failed)
                    }
                    else {
                        Ok(Some(res as u64))
                    }
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be an integer.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is out of the range of a `u32`.
    fn take_u32(&mut self, key: &str) -> Result<Option<u32>, Failed> {
        match self.take_u64(key)? {
            Some(value) => {
                match u32::try_from(value) {
                    Ok(value) => Ok(Some(value)),
                    Err(_) => {
                        error!(
                            "Failed in config file {}: \
                             value for '{}' is too large.",
                            self.path.display(), key
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a small unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is out of the range of a `u16`.
    fn take_u16(&mut self, key: &str) -> Result<Option<u16>, Failed> {
        match self.take_u64(key)? {
            Some(value) => {
                match u16::try_from(value) {
                    Ok(value) => Ok(Some(value)),
                    Err(_) => {
                        error!(
                            "Failed in config file {}: \
                             value for '{}' is too large.",
                            self.path.display(), key
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or if it is negative.
    fn take_usize(&mut self, key: &str) -> Result<Option<usize>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::Integer(res) = value {
                    usize::try_from(res).map(Some).map_err(|_| {
                        error!(
                            "Failed in config file {}: \
                            '{}' expected to be a positive integer.",
                            self.path.display(), key
                        );
                        Failed
                    })
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be an integer.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a string value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t a string.
    fn take_string(&mut self, key: &str) -> Result<Option<String>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::String(res) = value {
                    Ok(Some(res))
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be a string.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a string encoded value from the config file.
    ///
    /// The value is taken from the given `key`. It is expected to be a
    /// string and will be converted to the final type via
    /// `FromStr::from_str`.
    ///
    /// Returns `Ok(None)` if the key doesn’t exist. Returns an error if the
    /// key exists but the value isn’t a string or conversion fails.
    fn take_from_str<T>(&mut self, key: &str) -> Result<Option<T>, Failed>
    where T: FromStr, T::Err: fmt::Display {
        match self.take_string(key)? {
            Some(value) => {
                match T::from_str(&value) {
                    Ok(some) => Ok(Some(some)),
                    Err(err) => {
                        error!(
                            "Failed in config file {}: \
                             illegal value in '{}': {}.",
                            self.path.display(), key, err
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a path value from the config file.
    ///
    /// The path is taken from the given `key`. It must be a string value.
    /// It is treated as relative to the directory of the config file. If it
    /// is indeed a relative path, it is expanded accordingly and an
    /// absolute path is returned.
    ///
    /// Returns `Ok(None)` if the key does not exist. Returns an error if
    /// the key exists but the value isn’t a string.
    fn take_path(&mut self, key: &str) -> Result<Option<PathBuf>, Failed> {
        self.take_string(key).map(|opt| opt.map(|path| self.dir.join(path)))
    }

    /// Checks whether the config file is now empty.
    ///
    /// If it isn’t, logs a complaint and returns an error.
    fn check_exhausted(&self) -> Result<(), Failed> {
        if !self.content.is_empty() {
            print!(
                "Error: Unknown settings in config file {}:",
                self.path.display()
            );
            let mut first = true;
            for key in self.content.keys() {
                if !first {
                    print!(",");
                }
                else {
                    first = false
                }
                print!(" {}", key);
            }
            println!(".");
            Err(Failed)
        }
        else {
            Ok(())
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn process_basic_args(args: &[&str]) -> Config {
        let mut config = Config::default();
        config.apply_arg_matches(
            &Config::config_args(Command::new("echoput"))
                .get_matches_from(args),
            Path::new("/test")
        ).unwrap();
        config
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert!(config.host.is_none());
        assert_eq!(config.telnet_port, DEFAULT_TELNET_PORT);
        assert!(config.login.is_none());
        assert!(config.password.is_none());
        assert_eq!(
            config.wait_time, Duration::from_millis(DEFAULT_WAIT_TIME)
        );
        assert_eq!(config.bytes_per_line, DEFAULT_BYTES_PER_LINE);
        assert_eq!(
            config.connect_timeout,
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT)
        );
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.log_target, LogTarget::Stderr);
    }

    #[test]
    fn good_config_file() {
        let config = ConfigFile::parse(
            "port = \"/dev/ttyS3\"\n\
             baud-rate = 9600\n\
             host = \"192.0.2.17\"\n\
             telnet-port = 2323\n\
             login = \"root\"\n\
             password = \"hunter2\"\n\
             wait-time = 50\n\
             bytes-per-line = 16\n\
             connect-timeout = 5\n\
             log-level = \"debug\"\n\
             log = \"file\"\n\
             log-file = \"foo.log\"",
            Path::new("/test/echoput.conf")
        ).unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config.port, "/dev/ttyS3");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.host.as_deref(), Some("192.0.2.17"));
        assert_eq!(config.telnet_port, 2323);
        assert_eq!(config.login.as_deref(), Some("root"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert_eq!(config.wait_time, Duration::from_millis(50));
        assert_eq!(config.bytes_per_line, 16);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/test/foo.log"))
        );
    }

    #[test]
    fn minimal_config_file() {
        let config = ConfigFile::parse(
            "", Path::new("/test/echoput.conf")
        ).unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn bad_config_file() {
        assert!(
            ConfigFile::parse(
                "not a toml file", Path::new("/test/echoput.conf")
            ).is_err()
        );
        let config = ConfigFile::parse(
            "baud-rate = \"fast\"", Path::new("/test/echoput.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "wait-time = -2", Path::new("/test/echoput.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "telnet-port = 66000", Path::new("/test/echoput.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
        let config = ConfigFile::parse(
            "no-such-setting = true", Path::new("/test/echoput.conf")
        ).unwrap();
        assert!(Config::from_config_file(config).is_err());
    }

    #[test]
    fn zero_bytes_per_line_uses_default() {
        let config = ConfigFile::parse(
            "bytes-per-line = 0", Path::new("/test/echoput.conf")
        ).unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config.bytes_per_line, DEFAULT_BYTES_PER_LINE);

        let config = process_basic_args(
            &["echoput", "--bytes-per-line", "0"]
        );
        assert_eq!(config.bytes_per_line, DEFAULT_BYTES_PER_LINE);
    }

    #[test]
    fn basic_args() {
        let config = process_basic_args(&[
            "echoput",
            "-p", "/dev/ttyACM1",
            "-b", "57600",
            "--host", "device.example.com",
            "--telnet-port", "2323",
            "--login", "admin",
            "--password", "secret",
            "-t", "25",
            "--bytes-per-line", "32",
            "--connect-timeout", "3",
        ]);
        assert_eq!(config.port, "/dev/ttyACM1");
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.host.as_deref(), Some("device.example.com"));
        assert_eq!(config.telnet_port, 2323);
        assert_eq!(config.login.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.wait_time, Duration::from_millis(25));
        assert_eq!(config.bytes_per_line, 32);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn read_config_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echoput.conf");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "port = \"/dev/ttyS1\"").unwrap();
        drop(file);

        let config = ConfigFile::read(&path).unwrap().unwrap();
        let config = Config::from_config_file(config).unwrap();
        assert_eq!(config.port, "/dev/ttyS1");

        // A missing file is fine, it just isn’t there.
        assert!(
            ConfigFile::read(
                &dir.path().join("no-such.conf")
            ).unwrap().is_none()
        );
    }

    #[test]
    fn verbosity_args() {
        let config = process_basic_args(&["echoput"]);
        assert_eq!(config.log_level, LevelFilter::Info);
        let config = process_basic_args(&["echoput", "-v"]);
        assert_eq!(config.log_level, LevelFilter::Debug);
        let config = process_basic_args(&["echoput", "-vv"]);
        assert_eq!(config.log_level, LevelFilter::Trace);
        let config = process_basic_args(&["echoput", "-q"]);
        assert_eq!(config.log_level, LevelFilter::Error);
        let config = process_basic_args(&["echoput", "-qq"]);
        assert_eq!(config.log_level, LevelFilter::Off);
    }
}
