//! Access token authentication
//!
//! `Authentication` runs on every request. A valid bearer token attaches an
//! [`AuthenticatedUser`] to the request; a missing or invalid one leaves the
//! request anonymous. Handlers that need an identity take
//! `AuthenticatedUser` as an extractor, which rejects anonymous requests.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::validate_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Identity established from a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .copied()
                .ok_or(AppError::Auth(AuthError::MissingToken)),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub struct Authentication {
    jwt_config: JwtSettings,
}

impl Authentication {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct AuthenticationService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for AuthenticationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = bearer_token(&req).and_then(|token| {
            match validate_access_token(token, &self.jwt_config).and_then(|c| c.user_id()) {
                Ok(user_id) => Some(AuthenticatedUser { user_id }),
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring invalid access token");
                    None
                }
            }
        });

        if let Some(user) = identity {
            tracing::debug!(user_id = %user.user_id, "Request authenticated");
            req.extensions_mut().insert(user);
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_access_token;
    use actix_web::{test, web, App, HttpResponse};

    fn jwt_config() -> JwtSettings {
        JwtSettings {
            secret: "middleware-test-secret-value".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id.to_string())
    }

    async fn open() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn test_valid_token_identifies_user() {
        let config = jwt_config();
        let user_id = Uuid::new_v4();
        let token = generate_access_token(&user_id, &config).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(Authentication::new(config))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;

        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn test_anonymous_request_passes_through() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new(jwt_config()))
                .route("/open", web::get().to(open))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/open")
            .insert_header((AUTHORIZATION, "Bearer not-a-jwt"))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get().uri("/whoami").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }
}
