//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Encore Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[realtime]
# database_url = "https://encore-default-rtdb.firebaseio.com"
# auth_token = ""              # optional database token
# connect_timeout_secs = 15    # 1-120
# reconnect_delay_secs = 1     # 1-60
# max_reconnect_delay_secs = 30

[socket]
# base_url = "http://localhost:8080"
# endpoint = "/ws-chat"
# inbound_queue = "/user/queue/messages"
# send_destination = "/app/chat.send"
# connect_timeout_secs = 15

[api]
# base_url = "http://localhost:8080/api"
# request_timeout_secs = 20
# exchange_rate_url = "https://api.exchangerate-api.com/v4/latest/USD"

[cache]
# directory = ""               # empty = platform data directory
# streak_ttl_ms = 30000        # 1000-3600000
# exchange_rate_ttl_ms = 3600000

[notifications]
# auto_dismiss_ms = 10000
# feed_limit = 50              # 1-500
# warning_threshold_hours = 4  # 1-48

[presence]
# enabled = true
# device_stale_after_ms = 300000

[logging]
# level = "INFO"               # TRACE, DEBUG, INFO, WARNING, ERROR
# redact_secrets = true
"##
    .to_string()
}
