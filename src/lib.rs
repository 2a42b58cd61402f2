pub mod error;
pub mod tape;
pub mod machine;
pub mod program;
pub mod exec;
pub mod batch;
