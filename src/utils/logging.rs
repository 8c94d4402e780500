use tracing::{debug, error, info, warn};

/// Logs command start with consistent format
pub fn log_command_start(command: &str, user: &str, user_id: i64, chat_id: i64) {
    info!("CMD_START: {} by {}({}) in chat {}", command, user, user_id, chat_id);
}

/// Logs command errors with consistent format
pub fn log_command_error(command: &str, user_id: i64, error: &str) {
    error!("CMD_ERROR: {} by user {} - {}", command, user_id, error);
}

/// Wizard step transitions
pub fn log_wizard_step(user_id: i64, step: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("WIZARD: user {} -> {} - {}", user_id, step, d),
        None => debug!("WIZARD: user {} -> {}", user_id, step),
    }
}

/// Capture window events (open, shot, rejection)
pub fn log_capture_event(user_id: i64, event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("CAPTURE: user {} {} - {}", user_id, event, d),
        None => info!("CAPTURE: user {} {}", user_id, event),
    }
}

/// Settlement results
pub fn log_settlement(user_id: i64, passed: bool, verified: u32, shots: u32, reason: &str) {
    if passed {
        info!(
            "SETTLEMENT: user {} passed ({}/{} verified) - {}",
            user_id, verified, shots, reason
        );
    } else {
        warn!(
            "SETTLEMENT: user {} failed ({}/{} verified) - {}",
            user_id, verified, shots, reason
        );
    }
}

/// Logs database errors with consistent format
pub fn log_database_error(operation: &str, table: &str, error: &str) {
    error!("DB_ERROR: {} on {} failed: {}", operation, table, error);
}

/// Logs outbound API retries
pub fn log_retry(operation: &str, error: &str, delay_ms: u128) {
    warn!("RETRY: {} failed ({}), retrying in {}ms", operation, error, delay_ms);
}

/// Logs system events with consistent format
pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
