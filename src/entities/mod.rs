pub mod inventory_bucket;
pub mod sequence_counter;
pub mod stock_adjustment;
