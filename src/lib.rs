pub mod config;
pub mod error;
pub mod mail;
pub mod state;
pub mod telemetry;
pub mod users;

pub use error::AccountError;
pub use users::{
    dto::{UserCreate, UserUpdate},
    repo_types::{AccountStatus, UserAccount},
    services::AccountService,
};
