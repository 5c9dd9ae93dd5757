//! HTML rendering for the two front ends: the server-rendered menu page and
//! the embeddable SDK.

pub mod components;
pub mod html;
pub mod sdk;
pub mod templates;

pub use sdk::{FormSubmission, Sdk, Visibility};
