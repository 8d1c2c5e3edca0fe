pub mod ballot;
pub mod candidacy;
pub mod catalog;
pub mod results;
pub mod season;
pub mod spec;
pub mod tally;
pub mod voter;
pub mod winners;
