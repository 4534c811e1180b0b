pub mod accounts;
pub mod downloads;
pub mod helpers;
pub mod hosts;
pub mod software;
