pub mod cli;
pub mod config;
pub mod copy;
pub mod credentials;
pub mod git;
pub mod model;
pub mod paths;
pub mod promote;

mod api;
mod flock;

pub use api::{Promotion, PromotionBuilder};
pub use model::{Author, EnvLocation};
pub use promote::{CleanupOutcome, PromoteError, PromotionOutcome};
