//! Configuration validation

use super::Config;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_interface(config, &mut result);
    validate_probe(config, &mut result);
    validate_dhcp_service(config, &mut result);
    validate_logging(config, &mut result);

    result
}

fn validate_interface(config: &Config, result: &mut ValidationResult) {
    match config.interface.name.as_deref() {
        None => result.warn("interface.name: not specified, autodetecting"),
        Some("") => result.error("interface.name: must not be empty"),
        Some("lo") => result.error("interface.name: cannot probe on the loopback interface"),
        Some(_) => {}
    }
}

fn validate_probe(config: &Config, result: &mut ValidationResult) {
    let probe = &config.probe;

    if probe.retry_schedule.is_empty() {
        result.error("probe.retry_schedule: at least one attempt is required");
    } else if probe.retry_schedule[0] != 0 {
        result.warn(format!(
            "probe.retry_schedule: first attempt is delayed by {}s",
            probe.retry_schedule[0]
        ));
    }

    if probe.receive_timeout == 0 {
        result.error("probe.receive_timeout: must be at least 1 second");
    }

    if probe.link_poll_interval == 0 {
        result.warn("probe.link_poll_interval: 0 polls the interface in a busy loop");
    }

    if probe.endpoint_file.is_empty() {
        result.error("probe.endpoint_file: must not be empty");
    } else if probe.endpoint_file.contains('/') {
        result.error(format!(
            "probe.endpoint_file: '{}' must be a file name, not a path",
            probe.endpoint_file
        ));
    }

    if probe.lib_dir.is_relative() {
        result.warn(format!(
            "probe.lib_dir: '{}' is relative to the working directory",
            probe.lib_dir.display()
        ));
    }

    if probe.server_addr.is_unspecified() {
        result.error("probe.server_addr: 0.0.0.0 is not a valid destination");
    }
}

fn validate_dhcp_service(config: &Config, result: &mut ValidationResult) {
    if config.dhcp_service.name.trim().is_empty() {
        result.error("dhcp_service.name: must not be empty");
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            config.logging.level
        ));
    }
    if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            config.logging.format
        ));
    }
}
