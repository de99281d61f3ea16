pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STARTING_BALANCE: i64 = 1_000;
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_REPLY_CACHE_LEN: usize = 4_096;
pub const DEFAULT_STATIC_DIR: &str = "client/dist";
pub const MAX_USER_ID_CHARS: usize = 64;
pub const PLOT_LIST_LIMIT: usize = 100;

pub fn port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PORT)
}

/// Balance granted to a user the first time the server sees them.
pub fn starting_balance() -> i64 {
    std::env::var("STARTING_BALANCE")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(DEFAULT_STARTING_BALANCE)
}

pub fn broadcast_buffer() -> usize {
    std::env::var("BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

/// Replies remembered for replayed submissions.
pub fn reply_cache_len() -> usize {
    std::env::var("REPLY_CACHE_LEN")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_REPLY_CACHE_LEN)
}

pub fn static_dir() -> String {
    std::env::var("STATIC_DIR")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        temp_env::with_vars_unset(
            ["PORT", "STARTING_BALANCE", "BROADCAST_BUFFER", "REPLY_CACHE_LEN", "STATIC_DIR"],
            || {
                assert_eq!(port(), DEFAULT_PORT);
                assert_eq!(starting_balance(), DEFAULT_STARTING_BALANCE);
                assert_eq!(broadcast_buffer(), DEFAULT_BROADCAST_BUFFER);
                assert_eq!(reply_cache_len(), DEFAULT_REPLY_CACHE_LEN);
                assert_eq!(static_dir(), DEFAULT_STATIC_DIR);
            },
        );
    }

    #[test]
    fn env_overrides_are_parsed() {
        temp_env::with_vars(
            [
                ("PORT", Some("8080")),
                ("STARTING_BALANCE", Some("0")),
                ("REPLY_CACHE_LEN", Some("16")),
            ],
            || {
                assert_eq!(port(), 8080);
                assert_eq!(starting_balance(), 0);
                assert_eq!(reply_cache_len(), 16);
            },
        );
    }

    #[test]
    fn invalid_values_fall_back() {
        temp_env::with_vars(
            [
                ("PORT", Some("0")),
                ("STARTING_BALANCE", Some("-5")),
                ("BROADCAST_BUFFER", Some("lots")),
                ("STATIC_DIR", Some("  ")),
            ],
            || {
                assert_eq!(port(), DEFAULT_PORT);
                assert_eq!(starting_balance(), DEFAULT_STARTING_BALANCE);
                assert_eq!(broadcast_buffer(), DEFAULT_BROADCAST_BUFFER);
                assert_eq!(static_dir(), DEFAULT_STATIC_DIR);
            },
        );
    }
}
