use serde::Deserialize;

/// Draft for a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub address: String,
    pub nickname: String,
}

/// Profile patch; `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub address: Option<String>,
    pub nickname: Option<String>,
}
