// Order execution and data collection module
pub mod market;
pub mod normalizer;
pub mod rules;
pub mod runner;
pub mod sequencer;
pub mod sizing;

pub use market::MarketDataFeed;
pub use normalizer::{normalize_price, normalize_quantity, Normalizer};
pub use rules::RulesCache;
pub use runner::PairCycleRunner;
pub use sequencer::{
    evaluate_entry, CycleOutcome, EntryDecision, OrderSequencer, SequenceReport, SequencerState,
};
pub use sizing::resolve_quantity;
