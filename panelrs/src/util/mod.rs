pub(crate) mod introspect;
pub(crate) mod utils;
