#[cfg(feature = "fe-local")]
pub mod fastembed;

#[cfg(feature = "openai")]
pub mod openai;
