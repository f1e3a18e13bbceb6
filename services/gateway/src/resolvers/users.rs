use domain::commands::RegisterUserInput;
use domain::{GatewayError, RegisterUserResult, User};
use serde::Serialize;
use tracing::info;
use upstream::UserService;
use validator::Validate;

#[derive(Serialize)]
struct RegisterUserBody<'a> {
    input: &'a RegisterUserInput,
}

/// Pass-through reads and registration against the user backend
pub struct UserResolver {
    client: UserService,
}

impl UserResolver {
    pub fn new(client: UserService) -> Self {
        Self { client }
    }

    pub async fn get_all_users(&self) -> Result<Vec<User>, GatewayError> {
        self.client.get_all().await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<User, GatewayError> {
        self.client.get_by_id(id).await
    }

    /// Duplicate usernames come back from the backend as a validation error
    pub async fn register_user(
        &self,
        input: RegisterUserInput,
    ) -> Result<RegisterUserResult, GatewayError> {
        input.validate()?;

        let result: RegisterUserResult = self
            .client
            .post(&RegisterUserBody { input: &input }, &[])
            .await?;

        info!(user_id = %result.user.id, "User registered");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> UserResolver {
        UserResolver::new(UserService::new("user-service", &server.uri(), Duration::from_secs(2)).unwrap())
    }

    fn input(username: &str, password: &str) -> RegisterUserInput {
        RegisterUserInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_user_wraps_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(json!({"input": {"username": "ada", "password": "pw"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"user": {"_id": "u1", "username": "ada"}, "access_token": "tok"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = resolver(&server).register_user(input("ada", "pw")).await.unwrap();
        assert_eq!(result.user.username, "ada");
        assert_eq!(result.access_token, "tok");
    }

    #[tokio::test]
    async fn test_empty_username_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolver(&server).register_user(input("", "pw")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/u9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "User not Found"})))
            .mount(&server)
            .await;

        let err = resolver(&server).get_user_by_id("u9").await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("User not Found".to_string()));
    }
}
