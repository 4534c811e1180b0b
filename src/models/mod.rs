pub mod account;
pub mod app_state;
pub mod host_record;
pub mod host_view;

pub use account::Account;
pub use app_state::AppState;
pub use host_record::HostRecord;
pub use host_view::{AccountRow, HostView};
