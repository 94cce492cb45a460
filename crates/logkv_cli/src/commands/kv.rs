//! Key-value commands: get, set, delete.

use logkv_core::{Config, CoreResult, LogManager, Payload};
use std::path::Path;

/// Opens the log for a single command. The CLI never runs the timer.
fn open(path: &Path) -> CoreResult<LogManager> {
    LogManager::open(path, Config::default().without_background_compaction())
}

/// Parses the command-line value into a payload.
fn parse_payload(value: &str, int: bool) -> Result<Payload, Box<dyn std::error::Error>> {
    if int {
        let n: i64 = value
            .parse()
            .map_err(|e| format!("invalid integer {value:?}: {e}"))?;
        Ok(Payload::from(n))
    } else {
        Ok(Payload::from(value))
    }
}

/// Runs the get command.
pub fn get(path: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manager = open(path)?;
    let value = manager.get(key)?;

    tracing::debug!(key, version = value.version, ttl = ?value.ttl, "found key");
    println!("{}", value.payload);
    manager.stop()?;
    Ok(())
}

/// Runs the set command.
pub fn set(
    path: &Path,
    key: String,
    value: &str,
    int: bool,
    ttl: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = parse_payload(value, int)?;
    let manager = open(path)?;

    match ttl {
        Some(ttl) => manager.set_with_ttl(key, payload, ttl)?,
        None => manager.set(key, payload)?,
    }
    manager.stop()?;
    Ok(())
}

/// Runs the delete command.
pub fn delete(path: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manager = open(path)?;
    manager.delete(key)?;
    manager.stop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_payload_kinds() {
        assert_eq!(parse_payload("42", true).unwrap(), Payload::Int(42));
        assert_eq!(
            parse_payload("42", false).unwrap(),
            Payload::Str("42".to_string())
        );
        assert!(parse_payload("forty", true).is_err());
    }

    #[test]
    fn set_get_delete_round() {
        let dir = tempdir().unwrap();

        set(dir.path(), "n".to_string(), "7", true, Some(10)).unwrap();
        get(dir.path(), "n").unwrap();

        let manager = open(dir.path()).unwrap();
        let value = manager.get("n").unwrap();
        assert_eq!(value.as_int(), Some(7));
        assert_eq!(value.ttl, Some(10));
        drop(manager);

        delete(dir.path(), "n").unwrap();
        assert!(get(dir.path(), "n").is_err());
        assert!(delete(dir.path(), "n").is_err());
    }
}
