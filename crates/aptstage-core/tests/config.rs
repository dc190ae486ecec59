use std::io::Write;
use std::time::Duration;

use aptstage_core::protocol::{ConnectionConfig, ProtocolError};
use pretty_assertions::assert_eq;

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{
            "port_name": "/dev/ttyUSB3",
            "dest": 81,
            "timeout_ms": 250
        }}"#
    )
    .unwrap();

    let config = ConnectionConfig::load(file.path()).unwrap();
    assert_eq!(config.port_name, "/dev/ttyUSB3");
    assert_eq!(config.dest, 0x51);
    assert_eq!(config.src, 0x01);
    assert_eq!(config.timeout(), Duration::from_millis(250));
    assert_eq!(config.motion_timeout(), Duration::from_secs(120));
}

#[test]
fn test_config_json_roundtrip() {
    let config = ConnectionConfig {
        port_name: "COM7".to_string(),
        motion_timeout_ms: 30_000,
        ..ConnectionConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ConnectionConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConnectionConfig::load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ProtocolError::IoError(_))));
}
