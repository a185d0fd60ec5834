//! # Shadow Core
//!
//! Rule resolution and process lifecycle for a transparent proxy client.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Rule stores** - domain suffix tree, CIDR matcher, application rules,
//!   GeoIP classifier
//! - **Classifier** - one total decision function over all rule sources
//! - **Lifecycle** - exactly-once shutdown of every registered resource
//! - **Configuration** - JSON/TOML configuration snapshot
//!
//! Packet capture, DNS, the proxy transport and the country database are
//! external collaborators.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shadow_core::{AppContext, Flow, Verdict};
//! use shadow_core::rules::NoCountryLookup;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let ctx = AppContext::from_file("config.json", Duration::from_secs(30))?;
//! let classifier = ctx.build_classifier(Arc::new(NoCountryLookup))?;
//!
//! let verdict = classifier.classify(&Flow::domain("www.google.com"));
//! if verdict == Verdict::Blocked {
//!     // drop the flow
//! }
//!
//! ctx.close();
//! # Ok::<(), shadow_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod rules;

// Re-exports for convenience
pub use classifier::{Classifier, Decision, Flow, RuleSource};
pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use lifecycle::{closer_fn, Closer, ShutdownSignal, Supervisor};
pub use rules::Verdict;
