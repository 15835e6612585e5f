//! Validation for each config section.

use crate::schema::EncoreConfig;

use super::helpers::{validate_range, validate_range_u64, validate_url};

/// Validate realtime database settings.
pub(crate) fn validate_realtime(errors: &mut Vec<String>, config: &EncoreConfig) {
    let rt = &config.realtime;
    validate_url(
        errors,
        "realtime.database_url",
        &rt.database_url,
        &["https", "http"],
        true,
    );
    validate_range(
        errors,
        "realtime.connect_timeout_secs",
        rt.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "realtime.reconnect_delay_secs",
        rt.reconnect_delay_secs,
        1,
        60,
    );
    validate_range(
        errors,
        "realtime.max_reconnect_delay_secs",
        rt.max_reconnect_delay_secs,
        1,
        600,
    );
    if rt.max_reconnect_delay_secs < rt.reconnect_delay_secs {
        errors.push(format!(
            "realtime.max_reconnect_delay_secs ({}) must be >= realtime.reconnect_delay_secs ({})",
            rt.max_reconnect_delay_secs, rt.reconnect_delay_secs
        ));
    }
}

/// Validate socket and REST endpoints.
pub(crate) fn validate_endpoints(errors: &mut Vec<String>, config: &EncoreConfig) {
    validate_url(
        errors,
        "socket.base_url",
        &config.socket.base_url,
        &["http", "https", "ws", "wss"],
        false,
    );
    for (name, value) in [
        ("socket.endpoint", &config.socket.endpoint),
        ("socket.inbound_queue", &config.socket.inbound_queue),
        ("socket.send_destination", &config.socket.send_destination),
    ] {
        if !value.starts_with('/') {
            errors.push(format!("{name} = {value:?} must start with '/'"));
        }
    }
    validate_range(
        errors,
        "socket.connect_timeout_secs",
        config.socket.connect_timeout_secs,
        1,
        120,
    );
    validate_url(
        errors,
        "api.base_url",
        &config.api.base_url,
        &["http", "https"],
        false,
    );
    validate_range(
        errors,
        "api.request_timeout_secs",
        config.api.request_timeout_secs,
        1,
        300,
    );
    validate_url(
        errors,
        "api.exchange_rate_url",
        &config.api.exchange_rate_url,
        &["http", "https"],
        true,
    );
}

/// Validate cache constraints.
pub(crate) fn validate_cache(errors: &mut Vec<String>, config: &EncoreConfig) {
    validate_range_u64(
        errors,
        "cache.streak_ttl_ms",
        config.cache.streak_ttl_ms,
        1_000,
        3_600_000,
    );
    validate_range_u64(
        errors,
        "cache.exchange_rate_ttl_ms",
        config.cache.exchange_rate_ttl_ms,
        60_000,
        7 * 24 * 3_600_000,
    );
}

/// Validate notification constraints.
pub(crate) fn validate_notifications(errors: &mut Vec<String>, config: &EncoreConfig) {
    validate_range_u64(
        errors,
        "notifications.auto_dismiss_ms",
        config.notifications.auto_dismiss_ms,
        1_000,
        600_000,
    );
    validate_range(
        errors,
        "notifications.feed_limit",
        config.notifications.feed_limit,
        1,
        500,
    );
    validate_range(
        errors,
        "notifications.warning_threshold_hours",
        config.notifications.warning_threshold_hours,
        1,
        48,
    );
}

/// Validate presence constraints.
pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &EncoreConfig) {
    validate_range_u64(
        errors,
        "presence.device_stale_after_ms",
        config.presence.device_stale_after_ms,
        10_000,
        24 * 3_600_000,
    );
}
