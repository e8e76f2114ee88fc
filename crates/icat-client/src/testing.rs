//! Fixtures shared by the unit tests

use crate::connection::Connection;
use icat_common::ConnectionOptions;
use icat_native::MemoryCatalog;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // Several tests race to install the subscriber; only the first wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Credentials of the demo catalog's administrator
pub(crate) fn demo_options() -> ConnectionOptions {
    ConnectionOptions::user_defined("localhost", 1247, "tempZone", "rods", "password")
}

/// A fresh demo catalog and a connection to it as `rods`
pub(crate) fn connect() -> (MemoryCatalog, Connection) {
    init_tracing();
    let catalog = MemoryCatalog::demo();
    let connection = Connection::open(&catalog, &demo_options()).unwrap();
    (catalog, connection)
}
