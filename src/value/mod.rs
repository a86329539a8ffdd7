pub mod object;

pub use object::ObjectRef;
