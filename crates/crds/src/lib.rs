//! OpenTelemetry Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the collector controller.

pub mod opentelemetry_service;

pub use opentelemetry_service::*;
