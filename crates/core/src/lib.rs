pub mod catalog;
pub mod compare;
pub mod config;
pub mod errors;
pub mod intent;
pub mod lexicon;
pub mod preferences;
pub mod refine;
pub mod reply;
pub mod selection;
pub mod state;
pub mod text;

pub use catalog::{DiscoveryGroup, ProjectProfile, ScoredUnit, UnitOffering};
pub use compare::{Comparison, ProjectSummary};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{Intent, UnitSuperlative};
pub use selection::Resolution;
pub use state::{
    ConversationId, ConversationState, Features, Field, FloorType, Furnishing, Listing,
    PaymentPlan, StatePatch, UnitType,
};
