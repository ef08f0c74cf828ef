pub mod approval;
pub mod organization;
pub mod request;
