use serde::{Deserialize, Serialize};
use validator::Validate;

/// Input of `registerUser`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUserInput {
    #[validate(length(min = 1, message = "Username cannot be empty"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password cannot be empty"))]
    pub password: String,
}

/// Variables of the `registerUser` operation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUserCommand {
    #[validate(nested)]
    pub input: RegisterUserInput,
}
