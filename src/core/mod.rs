// Core modules implementing titles, page assembly, validation, and error modeling.
pub mod error;
pub mod page;
pub mod request;
pub mod title;
