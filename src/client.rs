use crate::error::Error;
use crate::remote::Channel;
use crate::session::Session;

/// Something that can open fresh channels to one remote identity.
pub trait Connect {
    type Channel: Channel;
    fn open(&self) -> anyhow::Result<Self::Channel>;
}

/// Hands out one new [`Session`] per operation.
pub struct Client<T> {
    connector: T,
}

impl<T: Connect> Client<T> {
    pub fn new(connector: T) -> Client<T> {
        Client { connector }
    }

    pub fn connector(&self) -> &T {
        &self.connector
    }

    pub fn session(&self) -> Result<Session<T::Channel>, Error> {
        let channel = self
            .connector
            .open()
            .map_err(|source| Error::transport(&[], source))?;
        Ok(Session::new(channel))
    }
}
