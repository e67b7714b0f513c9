pub mod services;

pub use services::{discard_picture, picture_extension, save_picture, PictureUpload};
