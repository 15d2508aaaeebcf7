mod demo;
mod list;
mod scaffold;

pub use demo::run_demo;
pub use list::{ListArgs, run_link, run_list};
pub use scaffold::run_scaffold;
