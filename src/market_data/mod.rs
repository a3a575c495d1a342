// Market data module entrypoint
pub mod types;          // funding rates, pivot rows, opportunities
pub mod adapters;       // venue-specific fetchers (Lighter, OKX)
pub mod normaliser;     // instrument ids -> canonical symbols
pub mod aggregator;     // merges adapter output per cycle
pub mod horizon;        // native 8h rate -> selected horizon
pub mod pivot;          // per-symbol, per-exchange matrix
pub mod ranking;        // spread and carry opportunities
pub mod stats;          // headline numbers
pub mod view;           // whole pipeline for one set of view options
pub mod funding_clock;  // next settlement boundary
pub mod scheduler;      // polling cadence, cancellation, published state
