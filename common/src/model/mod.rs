pub mod dataset;
pub mod verdict;
