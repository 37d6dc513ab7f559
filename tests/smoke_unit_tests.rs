//! Smoke Screen Unit tests for shipment lifecycle components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path.
//!

use chrono::{Datelike, Timelike};
use shipment_lifecycle::{
    ShipmentError,
    config::Config,
    error::{Precondition, ValidationError},
    gate::verify_otp,
    message::{DEFAULT_MAX_MESSAGE_BYTES, validate_text},
    shipment::{Checklist, DEFAULT_CHECKLIST, Shipment, ShipmentDetails, Status},
    stats::FleetStats,
    store::DEFAULT_MAX_SIGNATURE_BYTES,
    types::{Role, TimeStamp},
    utils::{generate_code, new_uuid_to_bech32, place_label},
};
use std::collections::HashMap;

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("ship_").unwrap();
        assert!(encoded.starts_with("ship_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("ship_").unwrap();
        let id2 = new_uuid_to_bech32("ship_").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn codes_carry_prefix_and_four_digits() {
        let code = generate_code("CL");
        let (prefix, digits) = code.split_once('-').unwrap();
        assert_eq!(prefix, "CL");
        assert_eq!(digits.len(), 4);
        assert!(digits.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn place_labels() {
        assert_eq!(place_label(" Curitiba ", "PR"), "Curitiba - PR");
    }
}

// TYPES MODULE TESTS
mod types_tests {
    use super::*;

    #[test]
    fn timestamp_from_components() {
        let ts = TimeStamp::new_with(2025, 3, 14, 15, 9, 26).unwrap();
        let dt = ts.to_datetime_utc();
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.month(), 3);
        assert_eq!(dt.hour(), 15);
        assert_eq!(ts.to_string(), "2025-03-14T15:09:26+00:00");
    }

    #[test]
    fn invalid_timestamp_components() {
        assert!(TimeStamp::new_with(2025, 2, 30, 0, 0, 0).is_none());
    }

    #[test]
    fn roles_parse_from_either_language() {
        assert_eq!("motorista".parse::<Role>().unwrap(), Role::Driver);
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert!(matches!(
            "gerente".parse::<Role>(),
            Err(ValidationError::UnknownRole(_))
        ));
    }
}

// SHIPMENT MODULE TESTS
mod shipment_tests {
    use super::*;

    fn shipment() -> Shipment {
        let details = ShipmentDetails::new()
            .set_description("Peças Automotivas")
            .set_value(8_500.0)
            .set_client(2)
            .set_weight("1200kg");
        Shipment::create(
            "ship_smoke".into(),
            "CL-0007".into(),
            "1234".into(),
            &details,
            TimeStamp::now(),
        )
        .unwrap()
    }

    #[test]
    fn standard_checklist_starts_unchecked() {
        let checklist = Checklist::standard();
        assert_eq!(checklist.len(), DEFAULT_CHECKLIST.len());
        assert!(!checklist.is_complete());
        assert_eq!(checklist.get("pneus"), Some(false));
    }

    #[test]
    fn merge_overrides_entries() {
        let stored = Checklist::from([("pneus", true), ("oleo", false)]);
        let merged = stored.merged_with(&Checklist::from([("oleo", true)]));
        assert!(merged.is_complete());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn state_labels() {
        let mut s = shipment();
        assert_eq!(s.state_label(), "pending");
        s.cancel("Endereço incorreto", TimeStamp::now()).unwrap();
        assert_eq!(s.state_label(), "canceled (while pending)");
        assert!(s.is_terminal());
    }

    #[test]
    fn participants() {
        let mut s = shipment();
        assert!(s.is_participant(2));
        assert!(!s.is_participant(3));
        s.assign(3, Some("XYZ-9876".into()), TimeStamp::now()).unwrap();
        assert!(s.is_participant(3));
    }

    #[test]
    fn history_newest_first() {
        let mut s = shipment();
        s.assign(3, None, TimeStamp::now()).unwrap();
        s.start_route(
            &Checklist::from([
                ("pneus", true),
                ("oleo", true),
                ("carga_presa", true),
                ("documentacao", true),
            ]),
            TimeStamp::now(),
        )
        .unwrap();

        let descriptions: Vec<_> = s
            .history()
            .newest_first()
            .map(|e| e.description().to_string())
            .collect();
        assert_eq!(descriptions, vec!["Route started", "Created"]);
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::EnRoute.to_string(), "en_route");
    }
}

// GATE AND MESSAGE TESTS
mod gate_tests {
    use super::*;

    #[test]
    fn otp_is_compared_exactly() {
        assert!(verify_otp("0420", "0420").is_ok());
        assert!(verify_otp("0420", "420").is_err());
        assert!(verify_otp("0420", "0420 ").is_err());
        assert!(verify_otp("0420", "").is_err());
    }

    #[test]
    fn mismatch_message_does_not_leak() {
        let err = verify_otp("0420", "1111").unwrap_err();
        assert!(!err.to_string().contains("0420"));
        assert_eq!(err.kind(), "otp_mismatch");
    }

    #[test]
    fn message_text_is_trimmed_and_bounded() {
        assert_eq!(validate_text("  oi  ", 10).unwrap(), "oi");
        assert_eq!(validate_text("", 10), Err(ValidationError::EmptyMessage));
        assert!(validate_text(&"a".repeat(DEFAULT_MAX_MESSAGE_BYTES + 1), DEFAULT_MAX_MESSAGE_BYTES).is_err());
        // bytes, not characters
        assert!(validate_text("ção", 4).is_err());
    }
}

// ERROR MODULE TESTS
mod error_tests {
    use super::*;

    #[test]
    fn incomplete_checklist_names_items() {
        let err: ShipmentError =
            Precondition::ChecklistIncomplete(vec!["oleo".into(), "pneus".into()]).into();
        assert_eq!(err.kind(), "precondition_failed");
        let text = err.to_string();
        assert!(text.contains("oleo"));
        assert!(text.contains("pneus"));
    }
}

// CONFIG MODULE TESTS
mod config_tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("SHIPMENT_DB_PATH", "/tmp/ships.db")])).unwrap();
        assert_eq!(config.db_path.to_str(), Some("/tmp/ships.db"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
        assert_eq!(config.code_prefix, "CL");
        assert_eq!(config.max_signature_bytes, DEFAULT_MAX_SIGNATURE_BYTES);
    }

    #[test]
    fn signature_bound_is_configurable() {
        let config = Config::from_lookup(lookup(&[
            ("SHIPMENT_DB_PATH", "ships.db"),
            ("MAX_SIGNATURE_BYTES", "4096"),
        ]))
        .unwrap();
        assert_eq!(config.max_signature_bytes, 4096);
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_lookup(lookup(&[
            ("SHIPMENT_DB_PATH", "ships.db"),
            ("LOG_LEVEL", "debug"),
            ("MAX_MESSAGE_BYTES", " 512 "),
            ("SHIPMENT_CODE_PREFIX", "TX"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_message_bytes, 512);
        assert_eq!(config.code_prefix, "TX");
    }

    #[test]
    fn missing_db_path_fails() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn unparsable_number_fails() {
        let err = Config::from_lookup(lookup(&[
            ("SHIPMENT_DB_PATH", "ships.db"),
            ("MAX_MESSAGE_BYTES", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_MESSAGE_BYTES"));
    }
}

// STATS MODULE TESTS
mod stats_tests {
    use super::*;

    #[test]
    fn empty_fleet() {
        let stats = FleetStats::collect(&Vec::<Shipment>::new());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rating, None);
    }
}

// TELEMETRY MODULE TESTS
mod telemetry_tests {
    use super::*;
    use shipment_lifecycle::telemetry::init_logging;

    /// The global subscriber can be installed once per process.
    #[test]
    fn logging_installs_once() {
        let config = Config::from_lookup(|name: &str| {
            (name == "SHIPMENT_DB_PATH").then(|| "ships.db".to_string())
        })
        .unwrap();

        assert!(init_logging(&config).is_ok());
        let err = init_logging(&config).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
