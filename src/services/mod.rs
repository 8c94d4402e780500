pub mod health;
pub mod relay;
pub mod reminder;
pub mod vision;
pub mod workout;
