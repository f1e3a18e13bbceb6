use auth::{TokenVerifier, AUTHORIZATION_HEADER};
use domain::commands::PlaceOrderCommand;
use domain::{GatewayError, Order};
use tracing::info;
use upstream::{OrderService, USER_ID_HEADER};
use validator::Validate;

use crate::context::RequestContext;

/// Order reads plus bearer-authorized placement.
///
/// The gateway is the trust boundary for the caller identity: the verified
/// `userId` claim is forwarded to the backend as `x-user-id`.
pub struct OrderResolver {
    client: OrderService,
    verifier: TokenVerifier,
}

impl OrderResolver {
    pub fn new(client: OrderService, verifier: TokenVerifier) -> Self {
        Self { client, verifier }
    }

    pub async fn get_all_orders(&self) -> Result<Vec<Order>, GatewayError> {
        self.client.get_all().await
    }

    pub async fn get_order_by_id(&self, id: &str) -> Result<Order, GatewayError> {
        self.client.get_by_id(id).await
    }

    pub async fn place_order(
        &self,
        command: PlaceOrderCommand,
        ctx: &RequestContext,
    ) -> Result<Order, GatewayError> {
        let user_id = self.verifier.authenticate(ctx.header(AUTHORIZATION_HEADER))?;
        command.validate()?;

        let order: Order = self
            .client
            .post(&command, &[(USER_ID_HEADER, user_id.as_str())])
            .await?;

        info!(order_id = %order.id, user_id = %user_id, "Order placed");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::Claims;
    use axum::http::{HeaderMap, HeaderValue};
    use domain::commands::OrderProductInput;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> OrderResolver {
        OrderResolver::new(
            OrderService::new("order-service", &server.uri(), Duration::from_secs(2)).unwrap(),
            TokenVerifier::new(Some("s3cret")),
        )
    }

    fn bearer(secret: &str, user_id: &str) -> RequestContext {
        let claims = Claims {
            user_id: user_id.to_string(),
            exp: None,
            iat: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        RequestContext::new(headers)
    }

    fn command() -> PlaceOrderCommand {
        PlaceOrderCommand {
            products: vec![OrderProductInput {
                id: "p1".to_string(),
                quantity: 2,
            }],
        }
    }

    #[tokio::test]
    async fn test_place_order_forwards_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-user-id", "u1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"_id": "o1", "userId": "u1", "products": [{"_id": "p1", "quantity": 2}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = resolver(&server)
            .place_order(command(), &bearer("s3cret", "u1"))
            .await
            .unwrap();
        assert_eq!(order.user_id, "u1");
    }

    #[tokio::test]
    async fn test_place_order_without_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolver(&server)
            .place_order(command(), &RequestContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
    }

    #[tokio::test]
    async fn test_place_order_with_foreign_signature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = resolver(&server)
            .place_order(command(), &bearer("not-our-secret", "u1"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
    }

    #[tokio::test]
    async fn test_place_order_validation_after_auth() {
        let server = MockServer::start().await;
        let err = resolver(&server)
            .place_order(PlaceOrderCommand { products: vec![] }, &bearer("s3cret", "u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
