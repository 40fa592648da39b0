pub mod candidates;
pub mod detail;

pub use candidates::parse_candidates;
pub use detail::{Detail, parse_detail_output};
