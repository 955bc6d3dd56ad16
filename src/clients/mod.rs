pub mod livy;
