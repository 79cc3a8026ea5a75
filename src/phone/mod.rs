pub mod matcher;
pub mod normalize;

pub use matcher::{select_best_match, MatchConfidence, MatchResult, PhoneMatcher};
pub use normalize::{clean_digits, extract_from_caller_id, PhoneNormalizer, UNKNOWN_NUMBER};
