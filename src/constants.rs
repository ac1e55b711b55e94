// -
// Metric vocabulary

/// Operation names
pub(crate) const GET_OPERATION: &str = "GET";
pub(crate) const GET_AND_TOUCH_OPERATION: &str = "GET_AND_TOUCH";
pub(crate) const BULK_OPERATION: &str = "BULK";
pub(crate) const SET_OPERATION: &str = "SET";
pub(crate) const ADD_OPERATION: &str = "ADD";
pub(crate) const REPLACE_OPERATION: &str = "REPLACE";
pub(crate) const DELETE_OPERATION: &str = "DELETE";
pub(crate) const TOUCH_OPERATION: &str = "TOUCH";
pub(crate) const APPEND_OR_ADD_OPERATION: &str = "APPEND_OR_ADD";
pub(crate) const APPEND_OR_ADD_ADD_LEG: &str = "APPEND_OR_ADD-Add";
pub(crate) const APPEND_OR_ADD_RETRY_LEG: &str = "APPEND_OR_ADD-RetryAppend";
pub(crate) const INCR_OPERATION: &str = "INCR";
pub(crate) const DECR_OPERATION: &str = "DECR";
pub(crate) const RECONNECT_OPERATION: &str = "RECONNECT";

/// Operation directions
pub(crate) const READ: &str = "READ";
pub(crate) const WRITE: &str = "WRITE";

/// Cache-hit tag values
pub(crate) const CACHE_HIT: &str = "YES";
pub(crate) const CACHE_MISS: &str = "NO";

/// Transport key-format limit in bytes
pub(crate) const MAX_KEY_LENGTH: usize = 250;
