// crates/ava-cli/src/store.rs
// ============================================================================
// Module: Store Wiring
// Description: Opens the SQLite store every subcommand runs its repository
//              calls against.
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use ava_store_sqlite::SqliteStore;
use ava_store_sqlite::SqliteStoreConfig;

use crate::CliError;

/// Opens a [`SqliteStore`] at `path`, mapping a failure to open or migrate
/// it to a bad-configuration error.
pub(crate) fn open_store(path: &Path) -> Result<Arc<SqliteStore>, CliError> {
    let config = SqliteStoreConfig::new(path);
    let store = SqliteStore::open(config)
        .map_err(|err| CliError::Configuration(format!("could not open store at {}: {err}", path.display())))?;
    Ok(Arc::new(store))
}
