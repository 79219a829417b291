//! caseiro: reservation lifecycle and access-gating engine for a
//! short-term-rental guest/host platform.
//!
//! The engine does four things:
//! - partitions bookings into **active** (checkout not yet passed) and
//!   **history** as wall-clock time advances, with no stored flag; the
//!   partition is recomputed on every read against "today" in a fixed
//!   business time zone;
//! - answers **availability** queries for a candidate date by reconciling
//!   confirmed reservations with host-blocked date ranges;
//! - **gates** sensitive access credentials (door lock code, safe code,
//!   wifi password) behind a release day one civil day before check-in;
//! - **sweeps** event listings whose dates have fully passed.
//!
//! Persistence sits behind [`store::ReservationStore`]; the bundled
//! [`store::MemoryStore`] implements the full contract for tests and
//! single-process setups. Live data arrives as whole-snapshot feeds, which
//! the [`engine::Engine`] applies last-snapshot-wins.
//!
//! Embedding:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use caseiro::{Engine, EngineConfig, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt::init();
//!     let config = EngineConfig::from_env();
//!     caseiro::observability::init(config.metrics_port);
//!
//!     let store = Arc::new(MemoryStore::new(config.business_zone));
//!     let engine = Engine::new(store, config);
//!
//!     // Opportunistic maintenance on session start, not a timer.
//!     let swept = engine
//!         .sweep_expired_events(caseiro::calendar::now_utc())
//!         .await
//!         .unwrap();
//!     tracing::info!("swept {swept} expired listings");
//! }
//! ```

pub mod calendar;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod sweeper;

pub use engine::{Engine, EngineConfig, EngineError};
pub use model::{GuestSafeView, HistoryView, TenantScope};
pub use store::{HistoryPage, MemoryStore, ReservationStore, StoreError};
