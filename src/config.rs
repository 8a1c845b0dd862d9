use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::optimizer::{EpsilonSchedule, PackingConfig};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "TRUCK_LOADOUT_API_HOST";
    const PORT_VAR: &'static str = "TRUCK_LOADOUT_API_PORT";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                log::warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = env_string(Self::PORT_VAR)
            .map(|raw| parse_port(&raw, Self::DEFAULT_PORT))
            .unwrap_or(Self::DEFAULT_PORT);

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Configuration of the packing engine.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
}

impl OptimizerConfig {
    const GRID_STEP_VAR: &'static str = "TRUCK_LOADOUT_GRID_STEP";
    const SAMPLE_STEP_VAR: &'static str = "TRUCK_LOADOUT_SAMPLE_STEP";
    const SUPPORT_TOLERANCE_VAR: &'static str = "TRUCK_LOADOUT_SUPPORT_TOLERANCE";
    const FACE_TOLERANCE_VAR: &'static str = "TRUCK_LOADOUT_FACE_TOLERANCE";
    const WALL_TOLERANCE_VAR: &'static str = "TRUCK_LOADOUT_WALL_TOLERANCE";
    const STABILITY_WEIGHT_VAR: &'static str = "TRUCK_LOADOUT_STABILITY_WEIGHT";
    const UNPLACED_PENALTY_VAR: &'static str = "TRUCK_LOADOUT_UNPLACED_PENALTY";
    const EPSILON_VAR: &'static str = "TRUCK_LOADOUT_EPSILON";
    const RESTARTS_VAR: &'static str = "TRUCK_LOADOUT_RESTARTS";
    const SCHEDULE_VAR: &'static str = "TRUCK_LOADOUT_EPSILON_SCHEDULE";
    const SEED_VAR: &'static str = "TRUCK_LOADOUT_SEED";
    const PARALLEL_VAR: &'static str = "TRUCK_LOADOUT_PARALLEL_RESTARTS";

    fn from_env() -> Self {
        let grid_step = load_f64_with_warning(
            Self::GRID_STEP_VAR,
            PackingConfig::DEFAULT_GRID_STEP,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted height map resolution changes support checks and run time",
        );

        let sample_step =
            Self::sample_step_for(env_string(Self::SAMPLE_STEP_VAR).as_deref(), grid_step);

        let support_tolerance = load_f64_with_warning(
            Self::SUPPORT_TOLERANCE_VAR,
            PackingConfig::DEFAULT_SUPPORT_TOLERANCE,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted support tolerance may allow boxes to float",
        );

        let face_tolerance = load_f64_with_warning(
            Self::FACE_TOLERANCE_VAR,
            PackingConfig::DEFAULT_FACE_TOLERANCE,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted face tolerance changes stability scores",
        );

        let wall_tolerance = load_f64_with_warning(
            Self::WALL_TOLERANCE_VAR,
            PackingConfig::DEFAULT_WALL_TOLERANCE,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted wall tolerance changes stability scores",
        );

        let stability_weight = load_f64_with_warning(
            Self::STABILITY_WEIGHT_VAR,
            PackingConfig::DEFAULT_STABILITY_WEIGHT,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted stability weight shifts the balance against unloading effort",
        );

        let unplaced_penalty = load_f64_with_warning(
            Self::UNPLACED_PENALTY_VAR,
            PackingConfig::DEFAULT_UNPLACED_PENALTY,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted penalty may favour arrangements that leave boxes behind",
        );

        let epsilon = load_f64_with_warning(
            Self::EPSILON_VAR,
            PackingConfig::DEFAULT_EPSILON,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Adjusted exploration rate",
        );

        let restarts = env_string(Self::RESTARTS_VAR)
            .map(|raw| parse_restarts(&raw, Self::RESTARTS_VAR))
            .unwrap_or(PackingConfig::DEFAULT_RESTARTS);

        let epsilon_schedule = env_string(Self::SCHEDULE_VAR)
            .and_then(|raw| parse_schedule(&raw, Self::SCHEDULE_VAR))
            .unwrap_or_default();

        let seed = env_string(Self::SEED_VAR).and_then(|raw| match raw.parse::<u64>() {
            Ok(seed) => Some(seed),
            Err(err) => {
                log::warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using a random seed.",
                    Self::SEED_VAR,
                    raw,
                    err
                );
                None
            }
        });

        let parallel_restarts = env_string(Self::PARALLEL_VAR)
            .and_then(|raw| parse_bool(&raw, Self::PARALLEL_VAR))
            .unwrap_or(false);

        let packing = PackingConfig::builder()
            .grid_step(grid_step)
            .sample_step(sample_step)
            .support_tolerance(support_tolerance)
            .face_tolerance(face_tolerance)
            .wall_tolerance(wall_tolerance)
            .stability_weight(stability_weight)
            .unplaced_penalty(unplaced_penalty)
            .epsilon(epsilon)
            .restarts(restarts)
            .epsilon_schedule(epsilon_schedule)
            .seed(seed)
            .parallel_restarts(parallel_restarts)
            .build();

        Self { packing }
    }

    /// Overhang sample spacing; never coarser than the height map cells.
    fn sample_step_for(raw: Option<&str>, grid_step: f64) -> f64 {
        let default = PackingConfig::DEFAULT_SAMPLE_STEP.min(grid_step);
        match raw {
            Some(raw) => parse_f64_with_warning(
                Self::SAMPLE_STEP_VAR,
                raw,
                default,
                |value| value > 0.0 && value <= grid_step,
                "must be greater than 0 and not exceed the grid step",
                "Adjusted overhang sampling changes support checks",
            ),
            None => default,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

impl From<PackingConfig> for OptimizerConfig {
    fn from(packing: PackingConfig) -> Self {
        Self { packing }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            log::warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name,
                err
            );
            None
        }
    }
}

fn parse_port(raw: &str, default: u16) -> u16 {
    match raw.parse::<u16>() {
        Ok(value) if value != 0 => value,
        Ok(_) => {
            log::warn!("⚠️ TRUCK_LOADOUT_API_PORT must not be 0. Using {}.", default);
            default
        }
        Err(err) => {
            log::warn!(
                "⚠️ Could not parse TRUCK_LOADOUT_API_PORT ('{}'): {}. Using {}.",
                raw,
                err,
                default
            );
            default
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            log::warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_restarts(raw: &str, var_name: &str) -> usize {
    let default = PackingConfig::DEFAULT_RESTARTS;
    match raw.trim().parse::<usize>() {
        Ok(value) if (1..=PackingConfig::MAX_RESTARTS).contains(&value) => value,
        Ok(value) => {
            log::warn!(
                "⚠️ {} must be between 1 and {}, got {}. Using {}.",
                var_name,
                PackingConfig::MAX_RESTARTS,
                value,
                default
            );
            default
        }
        Err(err) => {
            log::warn!(
                "⚠️ Could not parse {} ('{}') as count: {}. Using {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

fn parse_schedule(raw: &str, var_name: &str) -> Option<EpsilonSchedule> {
    let schedule = EpsilonSchedule::from_name(raw);
    if schedule.is_none() {
        log::warn!(
            "⚠️ {} ('{}') must be 'fixed' or 'annealing'. Using fixed.",
            var_name,
            raw
        );
    }
    schedule
}

fn parse_f64_with_warning(
    var_name: &str,
    raw: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && validator(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                log::warn!("⚠️ {} ({} = {}).", warning, var_name, value);
            }
            value
        }
        Ok(_) => {
            log::warn!(
                "⚠️ {} contains invalid value '{}': {}. Using {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            log::warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => {
            parse_f64_with_warning(var_name, &raw, default, validator, invalid_hint, warning)
        }
        None => default,
    }
}
