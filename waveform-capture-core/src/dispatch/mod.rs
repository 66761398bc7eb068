pub mod fan_out;
