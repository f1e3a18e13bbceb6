use auth::{ApiKeyGuard, TokenVerifier};
use cache::CacheStore;
use common::metrics::record_operation;
use common::GatewayConfig;
use domain::commands::{CreateProductCommand, IdArgs, PlaceOrderCommand, RegisterUserCommand};
use domain::GatewayError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use upstream::{OrderService, ProductService, UpstreamError, UserService};
use validator::Validate;

use crate::context::RequestContext;
use crate::resolvers::products::ProductsArgs;
use crate::resolvers::{OrderResolver, ProductResolver, UserResolver};

/// Externally named operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Users,
    User,
    Products,
    Product,
    Orders,
    Order,
    RegisterUser,
    CreateProduct,
    PlaceOrder,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Users => "users",
            Operation::User => "user",
            Operation::Products => "products",
            Operation::Product => "product",
            Operation::Orders => "orders",
            Operation::Order => "order",
            Operation::RegisterUser => "registerUser",
            Operation::CreateProduct => "createProduct",
            Operation::PlaceOrder => "placeOrder",
        }
    }
}

impl FromStr for Operation {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Operation::Users),
            "user" => Ok(Operation::User),
            "products" => Ok(Operation::Products),
            "product" => Ok(Operation::Product),
            "orders" => Ok(Operation::Orders),
            "order" => Ok(Operation::Order),
            "registerUser" => Ok(Operation::RegisterUser),
            "createProduct" => Ok(Operation::CreateProduct),
            "placeOrder" => Ok(Operation::PlaceOrder),
            other => Err(GatewayError::Validation(format!("Unknown operation: {}", other))),
        }
    }
}

/// Body of `POST /graphql`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation: String,
    #[serde(default)]
    pub variables: Value,
}

impl OperationRequest {
    pub fn new(operation: &str, variables: Value) -> Self {
        Self {
            operation: operation.to_string(),
            variables,
        }
    }
}

/// Binds each operation to exactly one resolver call
pub struct QueryRouter {
    users: UserResolver,
    products: ProductResolver,
    orders: OrderResolver,
}

impl QueryRouter {
    pub fn new(users: UserResolver, products: ProductResolver, orders: OrderResolver) -> Self {
        Self {
            users,
            products,
            orders,
        }
    }

    /// Build backend clients and resolvers from configuration
    pub fn from_config(
        config: &GatewayConfig,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, UpstreamError> {
        let backends = &config.backends;
        let users = UserService::new("user-service", &backends.user_service_url, backends.timeout)?;
        let products =
            ProductService::new("product-service", &backends.product_service_url, backends.timeout)?;
        let orders = OrderService::new("order-service", &backends.order_service_url, backends.timeout)?;

        let mut product_resolver = ProductResolver::new(
            products,
            cache,
            ApiKeyGuard::new(config.product_api_key.clone()),
        )
        .with_cache_timeout(config.cache_timeout);
        if config.coalesce_misses {
            info!("Coalescing concurrent product cache misses");
            product_resolver = product_resolver.with_coalescing();
        }

        Ok(Self::new(
            UserResolver::new(users),
            product_resolver,
            OrderResolver::new(orders, TokenVerifier::new(config.jwt_secret.as_deref())),
        ))
    }

    /// Run one operation; failures stay scoped to this call
    pub async fn dispatch(
        &self,
        request: OperationRequest,
        ctx: &RequestContext,
    ) -> Result<Value, GatewayError> {
        let span = info_span!(
            "operation",
            operation = %request.operation,
            request_id = %ctx.request_id
        );

        async move {
            let started = Instant::now();
            let label = Operation::from_str(&request.operation)
                .map(|op| op.as_str())
                .unwrap_or("unknown");

            let result = self.route(request, ctx).await;

            let status = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            record_operation(label, status, started.elapsed().as_secs_f64());

            match &result {
                Ok(_) => debug!(duration_ms = %started.elapsed().as_millis(), "Operation succeeded"),
                Err(e) => warn!(error = %e, "Operation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn route(&self, request: OperationRequest, ctx: &RequestContext) -> Result<Value, GatewayError> {
        let operation = Operation::from_str(&request.operation)?;
        let variables = request.variables;

        match operation {
            Operation::Users => respond(self.users.get_all_users().await?),
            Operation::User => {
                let args: IdArgs = validated_args(variables)?;
                respond(self.users.get_user_by_id(&args.id).await?)
            }
            Operation::Products => {
                let args: ProductsArgs = parse_args(variables)?;
                if let Some(id) = args.id {
                    debug!(id = %id, "products(id) ignores its id and returns the listing");
                }
                respond(self.products.get_all_products().await?)
            }
            Operation::Product => {
                let args: IdArgs = validated_args(variables)?;
                respond(self.products.get_product_by_id(&args.id).await?)
            }
            Operation::Orders => respond(self.orders.get_all_orders().await?),
            Operation::Order => {
                let args: IdArgs = validated_args(variables)?;
                respond(self.orders.get_order_by_id(&args.id).await?)
            }
            Operation::RegisterUser => {
                let command: RegisterUserCommand = parse_args(variables)?;
                respond(self.users.register_user(command.input).await?)
            }
            Operation::CreateProduct => {
                let command: CreateProductCommand = parse_args(variables)?;
                respond(self.products.create_product(command.input, ctx).await?)
            }
            Operation::PlaceOrder => {
                let command: PlaceOrderCommand = parse_args(variables)?;
                respond(self.orders.place_order(command, ctx).await?)
            }
        }
    }
}

/// Deserialize operation variables; a missing object reads as empty
fn parse_args<T: DeserializeOwned>(variables: Value) -> Result<T, GatewayError> {
    let variables = match variables {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(variables)
        .map_err(|e| GatewayError::Validation(format!("Invalid variables: {}", e)))
}

fn validated_args<T: DeserializeOwned + Validate>(variables: Value) -> Result<T, GatewayError> {
    let parsed: T = parse_args(variables)?;
    parsed.validate()?;
    Ok(parsed)
}

fn respond<T: Serialize>(value: T) -> Result<Value, GatewayError> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::Upstream(format!("Failed to encode response: {}", e)))
}
