pub mod column_matcher;
pub mod download_record;
pub mod locator;
pub mod result_row;
pub mod target;
