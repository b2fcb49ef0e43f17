use pcap_parser::PcapError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A read or seek would cross the end of the buffer
    #[error("attempt to access data out of range")]
    OutOfRange,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("pcap error: {0:?}")]
    Pcap(PcapError<&'static [u8]>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Generic(&'static str),
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Self {
        Error::Generic(s)
    }
}

impl<'a> From<PcapError<&'a [u8]>> for Error {
    fn from(e: PcapError<&'a [u8]>) -> Self {
        Error::Pcap(e.to_owned_vec())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
