//! Filesystem operations on a remote host, run as shell commands over a
//! single-use command channel (normally one `ssh` invocation).
//!
//! ```no_run
//! use rfs::{Client, SshConnector};
//!
//! # fn main() -> Result<(), rfs::Error> {
//! let client = Client::new(SshConnector::new("deploy@example.com"));
//! client.session()?.mkdir("/srv/app", 0o755)?;
//! client
//!     .session()?
//!     .as_user("www-data")
//!     .write_file("/srv/app/motd", &mut &b"hello\n"[..], 0o644)?;
//! assert!(client.session()?.exists("/srv/app/motd")?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod error;
pub mod executor;
pub mod local;
pub mod manager;
pub mod mock;
mod process;
pub mod remote;
pub mod session;
pub mod ssh;


pub use client::{Client, Connect};
pub use command::Op;
pub use error::Error;
pub use executor::OperationResult;
pub use local::LocalShell;
pub use remote::{Channel, ExitStatus, Streams};
pub use session::Session;
pub use ssh::SshConnector;
