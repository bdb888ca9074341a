mod blob;
mod chunk;
mod embedding;
mod file_blob;
mod import;
mod indexed_commit;
mod language;
mod progress;
mod repository;
mod search_result;
mod symbol;
mod usage;

pub use blob::*;
pub use chunk::*;
pub use embedding::*;
pub use file_blob::*;
pub use import::*;
pub use indexed_commit::*;
pub use language::*;
pub use progress::*;
pub use repository::*;
pub use search_result::*;
pub use symbol::*;
pub use usage::*;
