use sheet_mend::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../sheet-mend.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.engine.timeout_seconds, 120);
    assert_eq!(cfg.engine.valid_output_filename, "output.csv");
    assert_eq!(cfg.output.prefix, "processed_");
    assert!(!cfg.global.keep_intermediates);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let raw = "[engine]\npath = \"/opt/validator\"\ntimeout_seconds = 30\nvalid_output_filename = \"output.csv\"\n";
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.engine.path, "/opt/validator");
    assert_eq!(cfg.engine.timeout_seconds, 30);
    assert_eq!(cfg.logging.level, "info");
    assert!(cfg.classify.error_patterns.is_empty());
}
