pub mod delta;
pub mod telegram;

pub use delta::{DeltaClient, DeltaConfig};
pub use telegram::{TelegramClient, TelegramNotifier};
