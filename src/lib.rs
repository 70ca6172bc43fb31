#![warn(
    // Base lints.
    clippy::all,
    // Some pedantic lints.
    clippy::pedantic,
    // New lints which are cool.
    clippy::nursery,
)]
#![
    allow(
        clippy::module_name_repetitions,
        clippy::missing_errors_doc
    )
]

//! Security group ingress management for `TargetGroupBinding` resources.
//!
//! The embedding operator provides the cloud side through
//! [`networking::SecurityGroupManager`] and [`controller::EniInfoProvider`],
//! then drives everything with [`controller::run`].
//!
//! The crate has no binary. Process setup belongs to the embedding binary:
//! parsing [`NetworkingConfig`] (directly or `#[command(flatten)]` into its
//! own parser), installing a `tracing` subscriber and connecting to the
//! cluster.
//!
//! ```ignore
//! let config = NetworkingConfig::parse();
//! tracing_subscriber::fmt().init();
//! let client = kube::Client::try_default().await?;
//! tgb_networking::controller::run(client, config, sg_manager, eni_provider).await;
//! ```

pub mod config;
pub mod consts;
pub mod controller;
pub mod error;
pub mod networking;
pub mod store;
pub mod tag_filter;
pub mod tgb;

pub use config::NetworkingConfig;
pub use error::{NetworkingError, NetworkingResult};
