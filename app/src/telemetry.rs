use crate::config::{ConfigKey, ConfigStore, TelemetryConfig};
use crate::workflow::FailureKind;
use log::{error, info, warn};
use std::panic;
use uuid::Uuid;

/// Environment variable read when no DSN was baked in at build time
pub const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Get or create the anonymous install id attached to reports
///
/// If telemetry config already exists it is returned unchanged. Otherwise a
/// new UUID v4 is generated and stored with telemetry enabled.
pub fn get_or_create_install_id(config: &impl ConfigStore) -> TelemetryConfig {
    if let Some(telemetry) = config.get(&ConfigKey::TELEMETRY) {
        return telemetry;
    }

    let telemetry = TelemetryConfig {
        install_id: Uuid::new_v4().to_string(),
        telemetry_enabled: true,
    };
    info!("Generated new install ID for telemetry: {}", telemetry.install_id);

    if let Err(e) = config.set(&ConfigKey::TELEMETRY, telemetry.clone()) {
        warn!("Failed to save telemetry config: {}", e);
    }

    telemetry
}

fn configured_dsn() -> Option<String> {
    // Baked in at build time, with a runtime fallback for local testing
    const DSN: Option<&str> = option_env!("SENTRY_DSN");

    DSN.map(str::to_string)
        .or_else(|| std::env::var(SENTRY_DSN_ENV).ok())
        .filter(|dsn| !dsn.trim().is_empty())
}

/// Initialize Sentry for failure reporting
///
/// Returns `None` (and every later report is a no-op) when no DSN is set,
/// the DSN is malformed, or the user disabled telemetry.
pub fn init_sentry(config: &impl ConfigStore) -> Option<sentry::ClientInitGuard> {
    let Some(dsn) = configured_dsn() else {
        info!("Sentry DSN not configured, telemetry disabled");
        return None;
    };

    let telemetry = get_or_create_install_id(config);
    if !telemetry.telemetry_enabled {
        info!("Telemetry disabled in config");
        return None;
    }

    // sentry::init() can panic on malformed DSNs, so we validate first
    let parsed_dsn = match dsn.parse::<sentry::types::Dsn>() {
        Ok(dsn) => dsn,
        Err(e) => {
            warn!("Invalid Sentry DSN format: {}. Telemetry disabled.", e);
            return None;
        }
    };

    let install_id = telemetry.install_id;
    let result = panic::catch_unwind(move || {
        let guard = sentry::init(sentry::ClientOptions {
            dsn: Some(parsed_dsn),
            release: sentry::release_name!(),
            environment: Some(if cfg!(debug_assertions) {
                "development".into()
            } else {
                "production".into()
            }),
            sample_rate: 1.0,
            ..Default::default()
        });

        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(install_id),
                ..Default::default()
            }));
        });

        guard
    });

    match result {
        Ok(guard) => {
            info!("Sentry initialized successfully");
            Some(guard)
        }
        Err(panic_info) => {
            error!(
                "Sentry initialization panicked: {:?}. Telemetry disabled.",
                panic_info
            );
            None
        }
    }
}

/// Report a failed run. No-op when Sentry was not initialized.
pub fn report_failure(kind: FailureKind, message: &str) {
    sentry::with_scope(
        |scope| scope.set_tag("failure_kind", kind.to_string()),
        || {
            sentry::capture_message(message, sentry::Level::Error);
        },
    );
}
