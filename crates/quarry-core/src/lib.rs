pub mod archive;
pub mod descriptor;
pub mod fetch;
pub mod layout;
pub mod manifest;
pub mod stream;
