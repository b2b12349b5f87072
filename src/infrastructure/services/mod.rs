//! Infrastructure services

mod gateway_service;

pub use gateway_service::{GatewayResponse, GatewayService, InboundRequest};
