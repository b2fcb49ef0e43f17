mod backend;
mod config;
mod cursor;
mod engine;
mod error;
mod http;
mod packet;
mod pipeline;
mod rules;
mod split;
mod tls;

pub use backend::*;
pub use config::*;
pub use cursor::*;
pub use engine::*;
pub use error::*;
pub use http::*;
pub use packet::*;
pub use pipeline::*;
pub use rules::*;
pub use split::*;
pub use tls::*;

#[cfg(test)]
pub(crate) mod testutil;
