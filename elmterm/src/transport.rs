//! The byte stream to the adapter: a serial TTY opened through nix with
//! raw termios and a fixed baud rate, or a TCP socket. Both run
//! non-blocking; the session drives them off readiness events.

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use nix::fcntl::OFlag;
use nix::sys::termios::{self, BaudRate, SetArg};

use crate::cli::Target;
use crate::error::Error;

pub enum Transport {
    Tty(OwnedFd),
    Tcp(TcpStream),
}

impl Transport {
    /// Open the target. The TCP path honors the connect timeout; a serial
    /// device either opens or it does not.
    pub fn dial(target: &Target, timeout: Duration) -> Result<Self, Error> {
        match target {
            Target::Tty { path, baud } => open_tty(path, *baud),
            Target::Tcp { host, port } => connect_tcp(host, *port, timeout),
        }
    }

    /// Read available bytes. `WouldBlock` is passed through so the caller
    /// can tell "drained for now" apart from `Ok(0)` end-of-stream.
    pub fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Tty(fd) => {
                nix::unistd::read(fd.as_raw_fd(), buf).map_err(std::io::Error::from)
            }
            Transport::Tcp(stream) => {
                let mut stream: &TcpStream = stream;
                std::io::Read::read(&mut stream, buf)
            }
        }
    }

    /// Non-blocking write of as much of `buf` as the fd accepts.
    pub fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Tty(fd) => nix::unistd::write(fd.as_fd(), buf).map_err(std::io::Error::from),
            Transport::Tcp(stream) => {
                let mut stream: &TcpStream = stream;
                std::io::Write::write(&mut stream, buf)
            }
        }
    }
}

impl AsRawFd for Transport {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Transport::Tty(fd) => fd.as_raw_fd(),
            Transport::Tcp(stream) => stream.as_raw_fd(),
        }
    }
}

impl AsFd for Transport {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Transport::Tty(fd) => fd.as_fd(),
            Transport::Tcp(stream) => stream.as_fd(),
        }
    }
}

fn open_tty(path: &Path, baud: u32) -> Result<Transport, Error> {
    let rate = baud_rate(baud)?;

    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
        .open(path)?;
    let fd = OwnedFd::from(file);

    let mut tio = termios::tcgetattr(&fd)?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, rate)?;
    termios::tcsetattr(&fd, SetArg::TCSANOW, &tio)?;

    info!("opened {} at {baud} baud", path.display());
    Ok(Transport::Tty(fd))
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<Transport, Error> {
    let target = format!("{host}:{port}");

    let addrs: Vec<_> = target
        .to_socket_addrs()
        .map_err(|source| Error::Connect {
            target: target.clone(),
            source,
        })?
        .collect();

    let mut last = None;
    for addr in addrs {
        debug!("connecting to {addr}");
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(true).map_err(|source| Error::Connect {
                    target: target.clone(),
                    source,
                })?;
                let _ = stream.set_nodelay(true);
                info!("connected to {addr}");
                return Ok(Transport::Tcp(stream));
            }
            Err(e) => last = Some(e),
        }
    }

    let source = last.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
    });
    if source.kind() == std::io::ErrorKind::TimedOut {
        Err(Error::ConnectTimeout { target, timeout })
    } else {
        Err(Error::Connect { target, source })
    }
}

fn baud_rate(baud: u32) -> Result<BaudRate, Error> {
    let rate = match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        500_000 => BaudRate::B500000,
        _ => return Err(Error::UnsupportedBaud(baud)),
    };
    Ok(rate)
}
