//! Driver registry.
//!
//! The server selects exactly one driver at startup by name.  Names are
//! matched case-insensitively; an unregistered name is a fatal startup
//! error.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::driver::StorageDriver;
use crate::drivers::{BlockDriver, NasDriver, ObjectDriver};
use crate::error::StorError;

type DriverCtor = fn(&ServerConfig) -> Result<Arc<dyn StorageDriver>, StorError>;

fn new_block(config: &ServerConfig) -> Result<Arc<dyn StorageDriver>, StorError> {
    Ok(Arc::new(BlockDriver::new(config)?))
}

fn new_nas(config: &ServerConfig) -> Result<Arc<dyn StorageDriver>, StorError> {
    Ok(Arc::new(NasDriver::new(config)?))
}

fn new_object(config: &ServerConfig) -> Result<Arc<dyn StorageDriver>, StorError> {
    Ok(Arc::new(ObjectDriver::new(config)?))
}

const DRIVERS: &[(&str, DriverCtor)] = &[
    (BlockDriver::NAME, new_block),
    (NasDriver::NAME, new_nas),
    (ObjectDriver::NAME, new_object),
];

/// Construct the driver registered under `name`.
pub fn new_driver(
    name: &str,
    config: &ServerConfig,
) -> Result<Arc<dyn StorageDriver>, StorError> {
    let lowered = name.to_ascii_lowercase();
    for (registered, ctor) in DRIVERS {
        if *registered == lowered {
            return ctor(config);
        }
    }
    Err(StorError::UnknownDriver(name.to_owned()))
}

/// Names of every registered driver, in registration order.
pub fn driver_names() -> impl Iterator<Item = &'static str> {
    DRIVERS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            data_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn registered_names() {
        let names: Vec<_> = driver_names().collect();
        assert_eq!(names, ["block", "nas", "object"]);
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = new_driver("tape", &config(tmp.path()))
            .err()
            .expect("must fail");
        assert_eq!(err, StorError::UnknownDriver("tape".to_owned()));
    }

    #[test]
    fn names_match_case_insensitively() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let driver = new_driver("BLOCK", &config(tmp.path())).expect("driver");
        assert_eq!(driver.name(), "block");
    }
}
