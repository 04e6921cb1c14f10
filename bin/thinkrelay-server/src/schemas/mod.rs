//! Request / response types shared by the route handlers and the OpenAPI
//! document.

pub mod auth;
pub mod models;
pub mod relay;
