pub mod credential_format;
pub mod did;
pub mod input_descriptor;
pub mod jwt;
pub mod object;
pub mod policy;
pub mod presentation_definition;
pub mod presentation_exchange;
pub mod presentation_submission;
pub mod response;
pub mod signature;
pub mod util;
pub mod version;
