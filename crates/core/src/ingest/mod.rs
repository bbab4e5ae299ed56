pub mod quote;
pub mod social;

pub use quote::{QuoteLookup, YahooQuoteProvider};
pub use social::{HttpPostSource, PostSource};
