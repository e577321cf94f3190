//! What a handler receives: the request and the route's captured segments.

use std::collections::HashMap;
use std::str::FromStr;

use crate::Request;

/// Values captured by `:name` segments of the matched route.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    values: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The captured value converted to `T`. `None` covers both a missing
    /// capture and one that does not parse, which handlers usually answer
    /// with 404.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_cache::context::PathParams;
    ///
    /// let mut params = PathParams::new();
    /// params.insert("id", "42");
    /// assert_eq!(params.parse::<u64>("id"), Some(42));
    /// assert_eq!(params.parse::<u64>("slug"), None);
    /// ```
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One request as seen by its handler.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    /// A context with no captures, as for a route without `:name` segments.
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }
}
