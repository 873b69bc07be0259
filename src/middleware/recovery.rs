//! Panic recovery
//!
//! A handler that panics would otherwise drop the connection without a
//! response. `Recovery` catches the unwind, logs it and answers with the
//! standard 500 error body.

use std::any::Any;
use std::future::{ready, Ready};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use uuid::Uuid;

use crate::error::{AppError, ErrorHandler};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct Recovery;

impl<S, B> Transform<S, ServiceRequest> for Recovery
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RecoveryService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RecoveryService {
            service: Rc::new(service),
        }))
    }
}

pub struct RecoveryService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RecoveryService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let http_req = req.request().clone();
        let service = self.service.clone();

        Box::pin(async move {
            // Polling inside catch_unwind covers panics raised by `call`
            // itself as well as by the handler future.
            let outcome = AssertUnwindSafe(async move { service.call(req).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(result) => result.map(ServiceResponse::map_into_left_body),
                Err(payload) => {
                    let request_id = Uuid::new_v4().to_string();
                    tracing::error!(
                        request_id = %request_id,
                        method = %http_req.method(),
                        path = %http_req.path(),
                        panic = %panic_message(payload.as_ref()),
                        "Request handler panicked"
                    );

                    let error = AppError::Internal("handler panicked".to_string());
                    let (status, body) = ErrorHandler::error_response(&error, &request_id);
                    let response = HttpResponse::build(status).json(body);
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}
