pub mod compile_cmd;
pub mod data_cmd;
pub mod hierarchy_cmd;
pub mod list_cmd;
pub mod name_cmd;
pub mod type_cmd;

pub use compile_cmd::cmd_compile;
pub use data_cmd::cmd_data;
pub use hierarchy_cmd::{cmd_alias, cmd_parents};
pub use list_cmd::cmd_list;
pub use name_cmd::cmd_name;
pub use type_cmd::cmd_type;
