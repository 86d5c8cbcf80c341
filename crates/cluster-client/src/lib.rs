//! Deployment client for the collector controller
//!
//! A thin, mockable layer over the Kubernetes API for the one child resource
//! kind the controller manages.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterError, DeploymentClient, KubeDeploymentClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeDeploymentClient::new(kube::Client::try_default().await?);
//!
//! match client.get_deployment("observability", "demo-collector").await {
//!     Ok(existing) => println!("found {:?}", existing.metadata.resource_version),
//!     Err(ClusterError::NotFound(_)) => println!("not created yet"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Not-found as a value**: a 404 is reported as [`ClusterError::NotFound`]
//!   so callers can branch on absence without inspecting HTTP codes
//! - **Deadlines**: every call is bounded by a configurable timeout
//! - **Mocking**: `MockDeploymentClient` behind the `test-util` feature

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod deployment_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeDeploymentClient;
pub use deployment_trait::DeploymentClient;
pub use error::ClusterError;
#[cfg(feature = "test-util")]
pub use mock::MockDeploymentClient;
