//! # Pocket Core
//!
//! Core library for the Pocket command line client.
//!
//! This crate provides:
//! - A file-backed store for the consumer key and the authorization record
//! - The remote side of Pocket's three-legged authorization
//! - A one-shot local listener that detects the browser redirect
//! - [`AuthFlow`], which returns a cached credential or runs the full flow
//! - An item API client and output templates for the commands built on top
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pocket_core::{AuthFlow, CredentialStore, ItemClient, PocketAuthClient, PocketConfig};
//!
//! async fn client() -> Result<ItemClient, Box<dyn std::error::Error>> {
//!     let config = PocketConfig::load(None)?;
//!     let store = CredentialStore::new(&config);
//!     let consumer_key = store.load_consumer_key_interactive()?;
//!
//!     let flow = AuthFlow::new(&config, store, PocketAuthClient::new(&config.api_base_url)?);
//!     let outcome = flow.acquire(&consumer_key).await?;
//!
//!     Ok(ItemClient::new(&config.api_base_url, consumer_key, outcome.authorization)?)
//! }
//! ```

pub mod callback;
pub mod config;
pub mod flow;
pub mod items;
pub mod model;
pub mod remote;
pub mod store;
pub mod template;

// Re-export commonly used types at crate root
pub use model::{
    Authorization,
    ConsumerKey,
    RequestToken,
    Secret,
};

pub use config::{
    ConfigError,
    PocketConfig,
};

pub use store::{
    CredentialStore,
    StoreError,
};

pub use remote::{
    AuthorizationApi,
    PocketAuthClient,
    RemoteError,
};

pub use callback::{
    CallbackError,
    CallbackListener,
};

pub use flow::{
    AcquireOutcome,
    AuthError,
    AuthFlow,
    AuthorizationPrompt,
    CredentialSource,
    StdoutPrompt,
};

pub use items::{
    AddOptions,
    ApiError,
    Item,
    ItemClient,
    RetrieveOptions,
};

pub use template::ItemTemplate;
