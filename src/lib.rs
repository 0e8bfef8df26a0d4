//! # AI Router
//!
//! A capability routing and resilience layer in front of multiple AI
//! providers.
//!
//! This library provides:
//! - Typed capability contracts (completion, assessment, safety, vision,
//!   embedding, speech, translation, structured output, image generation)
//! - A provider registry with per-provider circuit breakers
//! - A two-tier response cache keyed by semantic request content
//! - A routing engine with a bounded, priority-ordered fallback cascade
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │            AiFacade              │
//!        │   (one typed method per call)    │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │          RoutingEngine           │──► ResponseCache (L1/L2)
//!        │  (cascade, health, accounting)   │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │         ProviderRegistry         │
//!        │ (descriptors, circuit breakers)  │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!                ┌─────────────────┐
//!                │ ProviderAdapter │  (one per vendor)
//!                └─────────────────┘
//! ```
//!
//! ## Call Flow
//! 1. Facade stamps a correlation id and builds the cache plan
//! 2. Engine checks the cache; a hit skips providers entirely
//! 3. Eligible providers are tried in priority order, bounded by the
//!    fallback limit
//! 4. Transport failures feed the provider's circuit breaker; logical
//!    rejections do not
//! 5. Success is cached (when cacheable) and returned with usage metadata
//!
//! ## Modules
//! - `contracts`: capability request/response types, errors, usage
//! - `adapter`: the per-vendor integration trait
//! - `registry`: provider descriptors, health, circuit breakers
//! - `cache`: two-tier response cache and cacheability rules
//! - `router`: the routing engine
//! - `facade`: typed per-capability entry points
//! - `config`: environment-driven tunables

pub mod adapter;
pub mod cache;
pub mod config;
pub mod contracts;
pub mod facade;
pub mod registry;
pub mod router;

pub use adapter::{AdapterError, AdapterOutput, AdapterResult, ProviderAdapter};
pub use cache::{ResponseCache, SharedResponseCache};
pub use config::{CacheConfig, CircuitConfig, RouterConfig};
pub use contracts::{AiUsage, Capability, CostTier, ErrorCode, RequestMeta, RouteError, Routed};
pub use facade::AiFacade;
pub use registry::{ProviderDescriptor, ProviderRegistry, SharedProviderRegistry};
pub use router::{RoutingEngine, SharedRoutingEngine};
