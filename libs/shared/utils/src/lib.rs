pub mod extractor;
pub mod clock;
pub mod formatting;
pub mod jwt;
pub mod pagination;
pub mod phone;
pub mod test_utils;
pub mod validation;
