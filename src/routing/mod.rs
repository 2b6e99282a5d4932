//! Filter resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Request attributes (dispatcher type, request path, servlet name)
//!     → resolver.rs (two ordered passes over the mappings)
//!     → matcher.rs (URL pattern / servlet name predicates)
//!     → Return: ordered, de-duplicated filter names
//!
//! Mapping compilation (at load or reload):
//!     FilterMappingConfig[]
//!     → mapping.rs (sentinels, dispatcher mask)
//!     → Frozen in configured order inside the Registry
//! ```
//!
//! # Design Decisions
//! - Mappings are immutable once compiled (safe to share without locks)
//! - No regex: exact, prefix and extension forms only
//! - Deterministic: same input always resolves to the same order

pub mod dispatcher;
pub mod mapping;
pub mod matcher;
pub mod resolver;

pub use dispatcher::{DispatcherMask, DispatcherType};
pub use mapping::{FilterMapping, ServletNames, UrlPatterns};
pub use resolver::resolve;
