pub mod constants;
pub mod encoded_image;
