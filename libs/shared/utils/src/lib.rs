pub mod extractor;
pub mod filter;
pub mod jwt;
pub mod test_utils;
pub mod validation;
