pub mod test_helpers;

pub use test_helpers::*;
