//! Authenticated request pipeline for Reddit-style content APIs: single-flight OAuth refresh,
//! FIFO throttling, rate-limit tracking, and bounded retries behind one `dispatch` call.
//!
//! The typed domain layer (posts, comments, listings) builds paths and form bodies and hands
//! them to [`Client::dispatch`]; everything that touches scheduling, credentials, and failure
//! handling lives here.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod pipeline;

pub use auth::Credentials;
pub use client::{Client, ClientBuilder};
#[cfg(feature = "reqwest")] pub use client::ReqwestSnooClient;
pub use config::{Config, Endpoints};
pub use error::{Error, Result};
pub use http::{Params, Verb};

mod _prelude {
	pub use std::{
		collections::BTreeSet,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
