//! Pure domain logic for the newsroom pipeline: the data model, the
//! fingerprint/similarity functions, the categorizer, the error taxonomy,
//! and the injected clock. Nothing in this crate performs I/O — it is the
//! library every other crate in the workspace builds on.

pub mod categorizer;
pub mod clock;
pub mod diversify;
pub mod error;
pub mod fingerprint;
pub mod ids;
pub mod models;

pub use categorizer::{categorize, CategorizationResult, CategoryTables, CATEGORIES};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use diversify::{diversify_by_source, verification_weight};
pub use error::{NewsroomError, Result};
pub use fingerprint::{fingerprint, similarity, tokenize};
pub use ids::{article_id, canonicalize_url, new_story_id};
pub use models::{Article, SourceArticleRef, Story, StoryStatus, Summary};
