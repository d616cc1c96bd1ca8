pub mod clustering;
pub mod feed_query;
pub mod llm;
pub mod status;
pub mod summarizer;

pub use clustering::{ArticleStore, ClusteringConfig, ClusteringEngine, ClusteringStats};
pub use feed_query::{FeedQuery, FeedQueryConfig, StoryPage};
pub use llm::{HttpLlmProvider, LlmProvider, MockLlmProvider, SummarizeRequest, SummarizeResponse};
pub use status::{
    apply_status_transition, update_significance, NoopObserver, StatusConfig, StatusSweeper,
    StatusTransitionObserver,
};
pub use summarizer::{CostMeter, Summarizer, SummarizerConfig, SummarizerMetrics, SummarizerStats};
