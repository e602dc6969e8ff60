pub mod ids;
pub mod schema;
pub mod task;

pub use ids::TaskUuid;
pub use schema::{Schema, BUILTIN_ATTRIBUTES, DATE_ATTRIBUTES};
pub use task::{is_valid_attribute_name, Partition, Status, Task};
