pub mod search_cmd;

pub use search_cmd::SearchCli;
