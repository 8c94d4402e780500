use crate::domain::{parse_money, validate_amount, validate_duration_days};
use anyhow::{anyhow, Result};

pub const MIN_REST_MIN: u32 = 1;
pub const MAX_REST_MIN: u32 = 60;
/// Rest intervals offered as buttons in the wizard.
pub const REST_OPTIONS: [u32; 4] = [5, 10, 15, 20];

pub fn validate_answer(answer: &str) -> Result<String> {
    let answer = answer.trim();

    if answer.is_empty() {
        return Err(anyhow!("Answer cannot be empty"));
    }

    if answer.chars().count() > 1000 {
        return Err(anyhow!("Answer is too long (max 1000 characters)"));
    }

    Ok(answer.to_string())
}

pub fn validate_rest_interval(input: &str) -> Result<u32> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let minutes: u32 = digits
        .parse()
        .map_err(|_| anyhow!("Rest interval must be a number of minutes"))?;

    if !(MIN_REST_MIN..=MAX_REST_MIN).contains(&minutes) {
        return Err(anyhow!(
            "Rest interval must be between {MIN_REST_MIN} and {MAX_REST_MIN} minutes"
        ));
    }
    Ok(minutes)
}

/// Custom deposit typed by the user, e.g. "7 000".
pub fn validate_deposit_input(input: &str) -> Result<i64> {
    let amount = parse_money(input);
    if amount == 0 {
        return Err(anyhow!("Deposit must be a whole number"));
    }
    validate_amount(amount)
}

pub fn validate_deposit_days_input(input: &str) -> Result<u32> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let days: u32 = digits
        .parse()
        .map_err(|_| anyhow!("Duration must be a number of days"))?;
    validate_duration_days(days)
}

pub fn validate_telegram_chat_id(chat_id: i64) -> Result<()> {
    if chat_id == 0 {
        return Err(anyhow!("Chat ID cannot be zero"));
    }

    // The coach only talks in private chats, whose ids equal the user id
    if chat_id < 0 {
        return Err(anyhow!("This bot only works in private chats"));
    }

    Ok(())
}

/// Splits callback data like `depwin_12345` into prefix and argument.
pub fn split_callback(data: &str) -> (&str, Option<&str>) {
    match data.split_once('_') {
        Some((prefix, arg)) if !arg.is_empty() => (prefix, Some(arg)),
        _ => (data, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_answer() {
        assert_eq!(validate_answer("  lose 5 kg  ").unwrap(), "lose 5 kg");
        assert!(validate_answer("   ").is_err());
        assert!(validate_answer(&"a".repeat(1001)).is_err());
    }

    #[test]
    fn test_validate_rest_interval() {
        assert_eq!(validate_rest_interval("10").unwrap(), 10);
        assert_eq!(validate_rest_interval("15 min").unwrap(), 15);
        assert!(validate_rest_interval("0").is_err());
        assert!(validate_rest_interval("90").is_err());
        assert!(validate_rest_interval("soon").is_err());
    }

    #[test]
    fn test_validate_deposit_input() {
        assert_eq!(validate_deposit_input("7 000").unwrap(), 7000);
        assert!(validate_deposit_input("100").is_err());
        assert!(validate_deposit_input("a lot").is_err());
        assert!(validate_deposit_input("1000000").is_err());
    }

    #[test]
    fn test_validate_deposit_days_input() {
        assert_eq!(validate_deposit_days_input("30 days").unwrap(), 30);
        assert!(validate_deposit_days_input("3").is_err());
        assert!(validate_deposit_days_input("365").is_err());
    }

    #[test]
    fn test_validate_telegram_chat_id() {
        assert!(validate_telegram_chat_id(12345).is_ok());
        assert!(validate_telegram_chat_id(0).is_err());
        assert!(validate_telegram_chat_id(-1001234567890).is_err());
    }

    #[test]
    fn test_split_callback() {
        assert_eq!(split_callback("depwin_42"), ("depwin", Some("42")));
        assert_eq!(split_callback("dep_ok"), ("dep", Some("ok")));
        assert_eq!(split_callback("ob_next"), ("ob", Some("next")));
        assert_eq!(split_callback("days_"), ("days_", None));
    }
}
