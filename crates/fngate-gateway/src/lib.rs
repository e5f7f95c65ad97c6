//! `fngate-gateway`: HTTP front door for remote functions.
//!
//! This crate provides the concrete implementations of the contracts defined
//! in `fngate-kernel::gateway`:
//!
//! | Kernel contract | Implementation |
//! |----------------|----------------|
//! | [`InvocationTransport`] | [`transport::HttpInvocationTransport`] |
//! | [`GatewayFilter`] | [`filter::RequestIdFilter`], [`filter::LoggingFilter`] |
//!
//! plus the request translation pipeline:
//!
//! - [`payload`] turns query string and body into a JSON payload,
//! - [`client_context`] builds the base64 client context envelope,
//! - [`invocation`] assembles and sends the invocation,
//! - [`routing`] runs it through the resilient executor and maps errors.
//!
//! The [`server::GatewayServer`] wires everything together into an axum HTTP
//! service.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fngate_gateway::server::GatewayServer;
//! use fngate_gateway::settings::{GatewaySettings, RouteSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = GatewaySettings {
//!         routes: vec![RouteSettings {
//!             path_prefix: "/hello".into(),
//!             route_key: "arn:aws:lambda:us-east-1:123456789012:function:hello".into(),
//!         }],
//!         ..Default::default()
//!     };
//!
//!     GatewayServer::new(settings).start().await.unwrap();
//! }
//! ```
//!
//! [`InvocationTransport`]: fngate_kernel::gateway::InvocationTransport
//! [`GatewayFilter`]: fngate_kernel::gateway::GatewayFilter

pub mod client_context;
pub mod error;
pub mod filter;
pub mod invocation;
pub mod payload;
pub mod routing;
pub mod server;
pub mod settings;
pub mod transport;

// Re-export the kernel gateway types for convenience.
pub use fngate_kernel::gateway;
