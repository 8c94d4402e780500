pub mod admin;
pub mod profile;
pub mod reminders;
pub mod start;
pub mod workout;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Workout coach commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start onboarding or open the main menu")]
    Start,
    #[command(description = "Show your profile and deposit progress")]
    Profile,
    #[command(description = "List your reminder times")]
    Reminders,
    #[command(description = "Start onboarding from scratch")]
    Reset,
    #[command(description = "Open a capture window right now")]
    StartWorkout,
    #[command(description = "Finish the current workout and settle it")]
    EndWorkout,
    #[command(description = "Admin: delete all users and captures")]
    ClearDb,
}
