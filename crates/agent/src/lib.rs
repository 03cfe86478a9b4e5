//! Agent runtime - turn orchestration and intent routing
//!
//! This crate is the "brain" of the sakan system - the layer that:
//! - Routes each user turn through the rule cascade, falling back to a
//!   pluggable AI classifier only when no rule fires
//! - Runs the per-turn state machine (selection, refinement, comparison,
//!   details, slot-filling, search)
//! - Serializes concurrent turns on the same conversation
//!
//! # Architecture
//!
//! A turn follows a constrained pipeline:
//! 1. **Routing** (`classifier`) - deterministic rules first, AI fallback
//!    under a bounded timeout
//! 2. **Transition** (`orchestrator`) - ordered branches over the current
//!    conversation state
//! 3. **Persistence** - the resulting patch merges atomically through the
//!    conversation store
//!
//! # Key Types
//!
//! - `Orchestrator` - main turn handler (see `orchestrator` module)
//! - `FallbackClassifier` - pluggable trait for the external classifier
//! - `ConversationLocks` - per-conversation single-writer serialization
//!
//! # Safety Principle
//!
//! The AI classifier is strictly a translator. It NEVER overrides a rule
//! hit, never writes state directly, and its entities always lose to the
//! deterministic extractor on conflict.

pub mod classifier;
pub mod locks;
pub mod orchestrator;
