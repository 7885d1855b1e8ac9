//! Per-request context handed to filters, direct handlers and controllers.
//!
//! A [`Context`] bundles the three things every stage of a request needs: the
//! parsed [`Request`], the [`ResponseWriter`] whose "started" flag gates the
//! rest of the pipeline, and the path parameters captured by the matched
//! route. A type-keyed [`Extensions`] map lets filters pass values on to the
//! controller without the two knowing each other's types.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::http::{Request, ResponseWriter, Values};

/// Type-erased request extensions map.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Everything one request carries through the router.
///
/// Scoped to exactly one request: created by the router after the static-file
/// check, dropped once the response has been produced.
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    params: Values,
    extensions: Extensions,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            params: Values::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Path parameters captured by the matched route.
    pub fn params(&self) -> &Values {
        &self.params
    }

    /// First captured value for `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Records captured parameters and merges them into the request's query set.
    pub(crate) fn set_params(&mut self, params: Values) {
        self.request.merge_params(&params);
        self.params = params;
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// Shorthand for `self.response().started()`.
    pub fn started(&self) -> bool {
        self.writer.started()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Consumes the context, yielding the request and buffered response.
    pub fn into_parts(self) -> (Request, ResponseWriter) {
        (self.request, self.writer)
    }
}
