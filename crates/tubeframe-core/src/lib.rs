//! Tubeframe Core - Declarative YouTube Player Library
//!
//! Lets a declarative host describe an embedded player with plain values
//! instead of driving the external player object by hand:
//! - One-time, shared loading of the player runtime
//! - Player construction from an initial description
//! - Minimal command diffing between successive descriptions
//! - Player lifetime across mount, unmount and container swaps
//! - Native event routing to the caller's current callbacks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Tubeframe Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   Description ──▶ ┌──────────────┐ ──commands──▶ ┌───────────┐  │
//! │                   │  Lifecycle   │               │  Player   │  │
//! │                   │   Manager    │◀── handle ──┐ │ (runtime) │  │
//! │                   └──────┬───────┘             │ └─────┬─────┘  │
//! │                          │                     │       │        │
//! │                   ┌──────┴───────┐    ┌────────┴─────┐ │events  │
//! │                   │  Reconciler  │    │   Factory    │ │        │
//! │                   └──────────────┘    └──────┬───────┘ ▼        │
//! │                                              │   ┌───────────┐  │
//! │                                       ┌──────┴─┐ │   Event   │  │
//! │                                       │ Loader │ │  Bridge   │  │
//! │                                       └────────┘ └───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tubeframe_core::{
//!     Container, Description, PlayerFactory, PlayerLifecycle, SdkConfig, SdkLoader,
//!     sim::{SimRuntime, SimScriptHost},
//! };
//!
//! # async fn run() -> tubeframe_core::Result<()> {
//! let host = Arc::new(SimScriptHost::new(SimRuntime::new()));
//! let loader = SdkLoader::global(host, SdkConfig::default());
//! let player = PlayerLifecycle::new(PlayerFactory::new(loader));
//!
//! player
//!     .mount(Container::new("player"), Description::new().video("dQw4w9WgXcQ"))
//!     .await?;
//! player
//!     .update(Description::new().video("dQw4w9WgXcQ").paused(true))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod description;
pub mod runtime;
pub mod loader;
pub mod factory;
pub mod reconcile;
pub mod bridge;
pub mod lifecycle;
pub mod sim;

pub use error::{Error, Result};
pub use types::*;
pub use config::SdkConfig;
pub use description::{
    Callback, ConstructionOptions, Description, EventData, HandlerSlot, Handlers, LiveOptions,
    PlayerEvent, PlayerParams,
};
pub use runtime::{
    NativeEvent, Player, PlayerHandle, PlayerOptions, PlayerVars, Runtime, RuntimeHandle,
    ScriptHost, VideoRequest,
};
pub use loader::SdkLoader;
pub use factory::PlayerFactory;
pub use reconcile::{diff, reconcile, Command, Plan};
pub use bridge::{EventBridge, EventSink};
pub use lifecycle::{LifecycleState, PlayerLifecycle};

use std::sync::{Mutex, MutexGuard};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Tubeframe Core initialized");
}

/// Lock, recovering the guard from a poisoned mutex
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
