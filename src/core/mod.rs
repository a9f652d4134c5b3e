pub mod llm;
pub mod lookup;

pub use llm::{CompletionClient, CompletionOutcome, OpenAiCompletionClient};
pub use lookup::{HttpUserLookup, UserLookup, UserLookupResult};
