//! Caller identity.
//!
//! Writes: header [`APP_NAME_HEADER`] on unary and streaming calls.
//!
//! Installed before the timeout interceptor, so the identity is present even
//! on calls that end up exceeding their deadline, and slow-call warnings can
//! report it.

use std::sync::Arc;

use callchain_core::APP_NAME_HEADER;
use http::HeaderValue;

use crate::interceptor::{Interceptor, StreamRequest, StreamingFunc, UnaryFunc, UnaryRequest};

/// Sends the calling application's name with every call.
#[derive(Clone, Debug)]
pub struct AppNameInterceptor {
    app_name: HeaderValue,
}

impl AppNameInterceptor {
    pub fn new(app_name: HeaderValue) -> Self {
        Self { app_name }
    }
}

impl Interceptor for AppNameInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let app_name = self.app_name.clone();
        Arc::new(move |mut request: UnaryRequest| {
            request.headers.insert(APP_NAME_HEADER, app_name.clone());
            next(request)
        })
    }

    fn wrap_streaming(&self, next: StreamingFunc) -> StreamingFunc {
        let app_name = self.app_name.clone();
        Arc::new(move |mut request: StreamRequest| {
            request.headers.insert(APP_NAME_HEADER, app_name.clone());
            next(request)
        })
    }
}
