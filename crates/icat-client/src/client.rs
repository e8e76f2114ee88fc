//! Scoped access to a catalog
//!
//! [`Client`] keeps a native client and connection options. Each `open_*`
//! call opens a fresh connection, hands it (or a node opened through it) to
//! a closure, then closes the node and disconnects whether or not the
//! closure succeeded.

use crate::collection::Collection;
use crate::connection::Connection;
use crate::dataobj::DataObject;
use crate::options::CollectionOptions;
use icat_common::{ConnectionOptions, Result};
use icat_native::NativeClient;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Factory for short-lived connections sharing one set of options
pub struct Client {
    native: Arc<dyn NativeClient>,
    options: ConnectionOptions,
}

impl Client {
    /// Verify the options with a test connect, then keep them
    pub fn new(native: Arc<dyn NativeClient>, options: ConnectionOptions) -> Result<Self> {
        let probe = Connection::open(native.as_ref(), &options)?;
        probe.disconnect()?;
        info!("Client ready for {}@{}:{}", options.username, options.host, options.port);
        Ok(Self { native, options })
    }

    #[must_use]
    pub const fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Run `f` on a fresh connection
    pub fn open_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let connection = Connection::open(self.native.as_ref(), &self.options)?;
        let result = f(&connection);
        let disconnected = connection.disconnect();
        let value = result?;
        disconnected?;
        Ok(value)
    }

    /// Run `f` on a collection opened through a fresh connection
    pub fn open_collection<T>(
        &self,
        options: CollectionOptions,
        f: impl FnOnce(&Arc<Collection>, &Connection) -> Result<T>,
    ) -> Result<T> {
        self.open_connection(|connection| {
            let collection = connection.collection(options)?;
            let result = f(&collection, connection);
            let closed = collection.close();
            let value = result?;
            closed?;
            Ok(value)
        })
    }

    /// Run `f` on a data object opened through a fresh connection
    pub fn open_data_object<T>(
        &self,
        path: &str,
        f: impl FnOnce(&Arc<DataObject>, &Connection) -> Result<T>,
    ) -> Result<T> {
        self.open_connection(|connection| {
            let data_object = connection.data_object(path)?;
            let result = f(&data_object, connection);
            let closed = data_object.close();
            let value = result?;
            closed?;
            Ok(value)
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("zone", &self.options.zone)
            .field("username", &self.options.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::demo_options;
    use icat_common::{Error, ErrorKind};
    use icat_native::MemoryCatalog;

    fn client() -> (MemoryCatalog, Client) {
        let catalog = MemoryCatalog::demo();
        let client = Client::new(Arc::new(catalog.clone()), demo_options()).unwrap();
        (catalog, client)
    }

    #[test]
    fn test_new_checks_credentials() {
        let catalog = MemoryCatalog::demo();
        let mut options = demo_options();
        options.password = "wrong".to_string();
        let err = Client::new(Arc::new(catalog), options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);

        let (_catalog, client) = client();
        assert_eq!(client.options().username, "rods");
        assert!(format!("{client:?}").contains("localhost"));
    }

    #[test]
    fn test_open_connection_disconnects() {
        let (_catalog, client) = client();
        let mut kept = None;
        let zone = client
            .open_connection(|conn| {
                kept = Some(conn.clone());
                Ok(conn.local_zone()?.name().to_string())
            })
            .unwrap();
        assert_eq!(zone, "tempZone");
        assert!(!kept.unwrap().is_connected());
    }

    #[test]
    fn test_open_collection_cleans_up_on_error() {
        let (catalog, client) = client();
        let mut kept = None;
        let err = client
            .open_collection(CollectionOptions::new("/tempZone/home/rods"), |home, conn| {
                kept = Some(conn.clone());
                home.get("hello.txt")?.open()?;
                Err::<(), _>(Error::invalid_argument("bail out"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!kept.unwrap().is_connected());
        assert_eq!(catalog.open_handle_count(), 0);
    }

    #[test]
    fn test_open_data_object() {
        let (catalog, client) = client();
        let data = client
            .open_data_object("/tempZone/home/rods/hello.txt", |hello, _| hello.read())
            .unwrap();
        assert_eq!(data, b"Hello, World!\n");

        let err = client
            .open_data_object("/tempZone/home/rods/missing.txt", |_, _| Ok(()))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(catalog.open_handle_count(), 0);
    }
}
