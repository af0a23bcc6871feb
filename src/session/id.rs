//! Deterministic session ids.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{ConnectionParams, Driver};

/// SHA-256 of a value's JSON form, as 64 lowercase hex characters.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// The identity-bearing subset of connection parameters. The password is
/// left out so a credential change does not fork the session.
#[derive(Serialize)]
struct SessionKey<'a> {
    driver: Driver,
    server: &'a str,
    database: Option<&'a str>,
    port: Option<u16>,
    user: Option<&'a str>,
    options: &'a BTreeMap<String, String>,
}

/// Session id for a set of connection parameters.
pub fn session_id_for(params: &ConnectionParams) -> Result<String, serde_json::Error> {
    compute_hash(&SessionKey {
        driver: params.driver,
        server: &params.server,
        database: params.database.as_deref(),
        port: params.port,
        user: params.user.as_deref(),
        options: &params.options,
    })
}
