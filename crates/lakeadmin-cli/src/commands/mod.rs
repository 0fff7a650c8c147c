pub mod apply;
pub mod groups;
pub mod validate;
